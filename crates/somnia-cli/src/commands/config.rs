use clap::Subcommand;
use somnia_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the configuration as TOML
    Show,
    /// Update timing values
    Set {
        /// Minutes of sleep before the alarm fires
        #[arg(long)]
        sleep_duration_min: Option<u32>,
        /// Minutes a wake interruption may last
        #[arg(long)]
        grace_window_min: Option<u32>,
        /// Seconds until the alarm fires in test mode
        #[arg(long)]
        test_sleep_secs: Option<u32>,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Set {
            sleep_duration_min,
            grace_window_min,
            test_sleep_secs,
        } => {
            let mut config = Config::load()?;
            if let Some(v) = sleep_duration_min {
                config.alarm.sleep_duration_min = v;
            }
            if let Some(v) = grace_window_min {
                config.alarm.grace_window_min = v;
            }
            if let Some(v) = test_sleep_secs {
                config.alarm.test_sleep_secs = v;
            }
            config.validate()?;
            config.save()?;
            println!("configuration saved");
        }
    }
    Ok(())
}

pub mod settings_struct;

pub use settings_struct::{
    ApiSettings, FilterSettings, HealthSettings, Settings, SettingsError, SpeedSettings,
};

//! Credentials baked in by `build.rs` from `.env` or the build environment.

use aquamon_core::{Config, InternetConfig, Schedule, ServerConfig};

pub const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};

pub const WIFI_PASSWORD: &str = match option_env!("WIFI_PASSWORD") {
    Some(password) => password,
    None => "",
};

pub const SERVER_ADDRESS: &str = match option_env!("SERVER_ADDRESS") {
    Some(address) => address,
    None => "http://192.168.1.77:3000",
};

/// The agent config assembled from the baked credentials.
pub fn config() -> Config<'static> {
    Config {
        internet: InternetConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
        },
        server: ServerConfig {
            base_address: SERVER_ADDRESS,
        },
        schedule: Schedule::default(),
    }
}

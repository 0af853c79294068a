//! Bakes WiFi credentials and the server address from `.env` into the binary.

const BAKED_VARS: [&str; 3] = ["WIFI_SSID", "WIFI_PASSWORD", "SERVER_ADDRESS"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for var in BAKED_VARS {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // Real environment variables win over .env
    if let Ok(entries) = dotenvy::dotenv_iter() {
        for (key, value) in entries.flatten() {
            if BAKED_VARS.contains(&key.as_str()) && std::env::var_os(&key).is_none() {
                println!("cargo:rustc-env={key}={value}");
            }
        }
    }

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

//! This build script copies the `memory.x` file from the crate root into
//! a directory where the linker can always find it at build time, and turns
//! the JSON files in `config/` into Rust constants for the firmware.
//!
//! The linker arguments are only emitted when building for the RP2040, so the
//! library and its tests keep building on the host.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::print_stdout)]

use std::{
    env, fs,
    fs::File,
    io,
    io::Write,
    path::{Path, PathBuf},
};

fn main() {
    println!("cargo:rerun-if-changed=config/wifi_config.json");
    println!("cargo:rerun-if-changed=config/hub_config.json");
    memory_x();
    wifi_secrets().unwrap();
    hub_config().unwrap();
}

/// Read a config file from `config/`, or create it with dummy contents if it doesn't exist
fn read_or_create_config(file_name: &str, dummy_config: &str) -> String {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR environment variable not set");
    let config_dir = Path::new(&manifest_dir).join("config");
    let config_path = config_dir.join(file_name);
    if config_path.exists() {
        fs::read_to_string(config_path).expect("Could not read config file")
    } else {
        println!("{file_name} not found, creating with dummy values");
        fs::create_dir_all(&config_dir).expect("Could not create config directory");
        fs::write(config_path, dummy_config).expect("Could not write dummy config file");
        dummy_config.to_string()
    }
}

/// Generate `wifi_secrets.rs` from `wifi_config.json`
fn wifi_secrets() -> io::Result<()> {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR environment variable not set");
    let dest_path = Path::new(&out_dir).join("wifi_secrets.rs");
    let mut f = File::create(dest_path)?;

    let config_contents =
        read_or_create_config("wifi_config.json", r#"{"ssid":"dummy","password":"dummy"}"#);

    let config: serde_json::Value =
        serde_json::from_str(&config_contents).expect("Could not parse wifi_config.json file");
    let ssid = config["ssid"]
        .as_str()
        .expect("ssid not found in wifi_config.json file");
    let password = config["password"]
        .as_str()
        .expect("password not found in wifi_config.json file");

    writeln!(f, "pub const SSID: &str = \"{ssid}\";")?;
    writeln!(f, "pub const PASSWORD: &str = \"{password}\";")?;
    Ok(())
}

/// Generate `hub_config.rs` from `hub_config.json`
fn hub_config() -> io::Result<()> {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR environment variable not set");
    let dest_path = Path::new(&out_dir).join("hub_config.rs");
    let mut f = File::create(dest_path)?;

    let config_contents = read_or_create_config(
        "hub_config.json",
        r#"{"broker":"192.168.1.10","port":1883,"device_id":"perimeter-alarm","username":"dummy","password":"dummy"}"#,
    );

    let config: serde_json::Value =
        serde_json::from_str(&config_contents).expect("Could not parse hub_config.json file");
    let broker = config["broker"]
        .as_str()
        .expect("broker not found in hub_config.json file");
    let octets: Vec<u8> = broker
        .split('.')
        .map(|octet| octet.parse().expect("broker must be an IPv4 address"))
        .collect();
    assert_eq!(octets.len(), 4, "broker must be an IPv4 address");
    let port = config["port"].as_u64().unwrap_or(1883);
    let device_id = config["device_id"]
        .as_str()
        .expect("device_id not found in hub_config.json file");
    let username = config["username"]
        .as_str()
        .expect("username not found in hub_config.json file");
    let password = config["password"]
        .as_str()
        .expect("password not found in hub_config.json file");

    writeln!(
        f,
        "pub const BROKER_ADDRESS: [u8; 4] = [{}, {}, {}, {}];",
        octets[0], octets[1], octets[2], octets[3]
    )?;
    writeln!(f, "pub const BROKER_PORT: u16 = {port};")?;
    writeln!(f, "pub const DEVICE_ID: &str = \"{device_id}\";")?;
    writeln!(f, "pub const HUB_USERNAME: &str = \"{username}\";")?;
    writeln!(f, "pub const HUB_PASSWORD: &str = \"{password}\";")?;
    Ok(())
}

/// Handle the `memory.x` linker script
fn memory_x() {
    // Put `memory.x` in our output directory and ensure it's
    // on the linker search path.
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(include_bytes!("memory.x"))
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=memory.x");

    let target = env::var("TARGET").unwrap_or_default();
    if target.starts_with("thumbv6m") {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}

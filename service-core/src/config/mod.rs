use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    5000
}

impl Config {
    /// Load listener settings.
    ///
    /// Plain `PORT` acts as a fallback below the optional `configuration`
    /// file and `APP__`-prefixed variables.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut builder = Cfg::builder();
        if let Ok(port) = env::var("PORT") {
            builder = builder.set_default("port", port)?;
        }

        let config = builder
            .add_source(File::with_name("configuration").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

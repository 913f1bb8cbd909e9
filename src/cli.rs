use crate::config::AppConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    base_url: Option<String>,
    editor_port: Option<u16>,
    thumbnail_resolution: Option<u32>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!(
                    "Unexpected argument '{flag}'. Use --service-url/--editor-port/--thumbnail-resolution with values."
                );
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "service-url" => {
                    overrides.base_url = Some(value);
                }
                "editor-port" => {
                    overrides.editor_port = Some(
                        value.parse::<u16>().with_context(|| format!("Invalid editor port '{value}'"))?,
                    );
                }
                "thumbnail-resolution" => {
                    overrides.thumbnail_resolution = Some(
                        value
                            .parse::<u32>()
                            .with_context(|| format!("Invalid thumbnail resolution '{value}'"))?,
                    );
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --service-url, --editor-port, --thumbnail-resolution."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn into_config_overrides(self) -> AppConfigOverrides {
        AppConfigOverrides {
            base_url: self.base_url,
            editor_port: self.editor_port,
            thumbnail_resolution: self.thumbnail_resolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = [
            "app",
            "--service-url",
            "http://localhost:9000",
            "--editor-port",
            "30000",
            "--thumbnail-resolution",
            "512",
        ];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(overrides.editor_port, Some(30000));
        assert_eq!(overrides.thumbnail_resolution, Some(512));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["app", "--editor-port", "1000", "--editor-port", "2000"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.editor_port, Some(2000));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["app", "--service-url"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = CliOverrides::parse(["app", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
    }

    #[test]
    fn rejects_bad_port() {
        assert!(CliOverrides::parse(["app", "--editor-port", "99999"]).is_err());
    }
}

//! Configuration loading for the CLI.
//!
//! - `--config FILE` - a JSON `PipelineConfig`; missing fields use defaults
//! - `COMPLIANCE_REQUESTS_PER_SECOND` - optional completion rate limit
//! - `COMPLIANCE_REQUESTS_BURST` - optional burst allowance on top of the rate

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use compliance_extraction::{PipelineConfig, SegmentMode};

pub const REQUESTS_PER_SECOND_VAR: &str = "COMPLIANCE_REQUESTS_PER_SECOND";
pub const REQUESTS_BURST_VAR: &str = "COMPLIANCE_REQUESTS_BURST";

/// Load the pipeline configuration, or defaults when no file is given.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Parse `heading`, `page` or `group:N`.
pub fn parse_mode(value: &str) -> std::result::Result<SegmentMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "heading" => Ok(SegmentMode::HeadingAware),
        "page" => Ok(SegmentMode::PerPage),
        other => {
            let count = other
                .strip_prefix("group:")
                .ok_or_else(|| format!("unknown mode '{value}' (expected heading, page or group:N)"))?;
            match count.parse::<usize>() {
                Ok(n) if n > 0 => Ok(SegmentMode::PageGroups { pages_per_chunk: n }),
                _ => Err(format!("invalid page group size '{count}'")),
            }
        }
    }
}

/// Read the optional rate limit from the environment. Zero disables it.
pub fn requests_per_second() -> Result<Option<u32>> {
    parse_count(REQUESTS_PER_SECOND_VAR, env::var(REQUESTS_PER_SECOND_VAR).ok().as_deref())
}

/// Read the optional burst allowance. Only used together with a rate.
pub fn requests_burst() -> Result<Option<u32>> {
    parse_count(REQUESTS_BURST_VAR, env::var(REQUESTS_BURST_VAR).ok().as_deref())
}

fn parse_count(var: &str, value: Option<&str>) -> Result<Option<u32>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(0) => Ok(None),
        Ok(count) => Ok(Some(count)),
        Err(_) => bail!("{var} must be a whole number, got '{raw}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("heading"), Ok(SegmentMode::HeadingAware));
        assert_eq!(parse_mode("PAGE"), Ok(SegmentMode::PerPage));
        assert_eq!(
            parse_mode("group:3"),
            Ok(SegmentMode::PageGroups { pages_per_chunk: 3 })
        );
        assert!(parse_mode("group:0").is_err());
        assert!(parse_mode("group:x").is_err());
        assert!(parse_mode("sentences").is_err());
    }

    #[test]
    fn test_parse_rate() {
        let var = REQUESTS_PER_SECOND_VAR;
        assert_eq!(parse_count(var, None).unwrap(), None);
        assert_eq!(parse_count(var, Some(" ")).unwrap(), None);
        assert_eq!(parse_count(var, Some("0")).unwrap(), None);
        assert_eq!(parse_count(var, Some("5")).unwrap(), Some(5));
        assert!(parse_count(var, Some("fast")).is_err());
    }

    #[test]
    fn test_parse_burst_names_its_variable() {
        assert_eq!(parse_count(REQUESTS_BURST_VAR, Some("10")).unwrap(), Some(10));

        let err = parse_count(REQUESTS_BURST_VAR, Some("-1")).unwrap_err();
        assert!(err.to_string().contains(REQUESTS_BURST_VAR));
    }

    #[test]
    fn test_load_defaults_without_file() {
        let config = load(None).unwrap();
        assert_eq!(config.segmenter.max_chars, 6000);
        assert!(config.extraction.enable_llm);
    }

    #[test]
    fn test_load_partial_file() {
        let path = env::temp_dir().join(format!("compliance-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"extraction": {"classify_batch_size": 5}}"#).unwrap();

        let config = load(Some(&path)).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.extraction.classify_batch_size, 5);
        assert_eq!(config.extraction.retries, 2);
    }
}

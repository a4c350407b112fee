//! Viewer configuration parsed from the command line.

use std::path::PathBuf;

use crate::error::ViewerError;
use crate::system::ParticleKind;

/// Everything tunable from outside the process.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub kind: ParticleKind,
    pub particle_size: f32,
    /// Cohesion slider value in percent.
    pub cohesion: i32,
    pub local_cohesion: i32,
    pub automata_radius: i32,
    pub automata_lifetime: u32,
    /// Connection cap for budding growth particles.
    pub child_threshold: u32,
    /// Growth branch length as a multiple of the particle size.
    pub branch_length: f32,
    pub ssao_radius: f32,
    pub ssao_bias: f32,
    /// Directory holding six skybox face images; procedural sky when unset.
    pub skybox_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            kind: ParticleKind::Linked,
            particle_size: 0.35,
            cohesion: 70,
            local_cohesion: 70,
            automata_radius: 4,
            automata_lifetime: 200,
            child_threshold: 3,
            branch_length: 3.0,
            ssao_radius: 5.0,
            ssao_bias: 0.025,
            skybox_dir: None,
            width: 1280,
            height: 720,
        }
    }
}

impl ViewerConfig {
    /// Parse `--flag value` pairs from process arguments. Unknown flags and
    /// malformed values fail with `InvalidVariant` so startup errors are
    /// visible instead of silently ignored.
    pub fn from_args(args: impl Iterator<Item = String>) -> Result<Self, ViewerError> {
        let mut config = Self::default();
        let mut args = args;

        while let Some(flag) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| ViewerError::InvalidVariant(format!("{} needs a value", flag)))
            };
            match flag.as_str() {
                "--kind" => config.kind = value(&flag)?.parse()?,
                "--size" => config.particle_size = parse_num(&flag, &value(&flag)?)?,
                "--cohesion" => config.cohesion = parse_num(&flag, &value(&flag)?)?,
                "--local-cohesion" => config.local_cohesion = parse_num(&flag, &value(&flag)?)?,
                "--automata-radius" => config.automata_radius = parse_num(&flag, &value(&flag)?)?,
                "--automata-lifetime" => config.automata_lifetime = parse_num(&flag, &value(&flag)?)?,
                "--child-threshold" => config.child_threshold = parse_num(&flag, &value(&flag)?)?,
                "--branch-length" => config.branch_length = parse_num(&flag, &value(&flag)?)?,
                "--ssao-radius" => config.ssao_radius = parse_num(&flag, &value(&flag)?)?,
                "--ssao-bias" => config.ssao_bias = parse_num(&flag, &value(&flag)?)?,
                "--skybox" => config.skybox_dir = Some(PathBuf::from(value(&flag)?)),
                "--width" => config.width = parse_num(&flag, &value(&flag)?)?,
                "--height" => config.height = parse_num(&flag, &value(&flag)?)?,
                other => {
                    return Err(ViewerError::InvalidVariant(format!(
                        "unknown flag '{}'",
                        other
                    )))
                }
            }
        }
        Ok(config)
    }
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, ViewerError> {
    value
        .parse()
        .map_err(|_| ViewerError::InvalidVariant(format!("bad value '{}' for {}", value, flag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ViewerConfig, ViewerError> {
        ViewerConfig::from_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_without_args() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.kind, ParticleKind::Linked);
        assert_eq!(config.width, 1280);
    }

    #[test]
    fn parses_kind_and_numbers() {
        let config = parse(&["--kind", "automata", "--size", "0.5", "--width", "800"]).unwrap();
        assert_eq!(config.kind, ParticleKind::Automata);
        assert_eq!(config.particle_size, 0.5);
        assert_eq!(config.width, 800);
    }

    #[test]
    fn parses_growth_parameters() {
        let config = parse(&["--kind", "growth", "--branch-length", "2.5", "--child-threshold", "4"]).unwrap();
        assert_eq!(config.kind, ParticleKind::Growth);
        assert_eq!(config.branch_length, 2.5);
        assert_eq!(config.child_threshold, 4);
    }

    #[test]
    fn bad_kind_is_invalid_variant() {
        assert!(matches!(
            parse(&["--kind", "banana"]),
            Err(ViewerError::InvalidVariant(_))
        ));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse(&["--frobnicate", "1"]).is_err());
    }

    #[test]
    fn missing_value_is_rejected() {
        assert!(parse(&["--size"]).is_err());
    }
}

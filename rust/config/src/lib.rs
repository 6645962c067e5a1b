//! Configuration types for the forget-mult recurrence crates.

#[cfg(feature = "burn")]
pub use burn::config::Config;

mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_auto() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Auto);
        assert_eq!(ForgetMultConfig::default().mode, ExecutionMode::Auto);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("auto".parse::<ExecutionMode>().unwrap(), ExecutionMode::Auto);
        assert_eq!("fused".parse::<ExecutionMode>().unwrap(), ExecutionMode::Fused);
        assert_eq!("CUDA".parse::<ExecutionMode>().unwrap(), ExecutionMode::Fused);
        assert_eq!(
            "cpu-loop".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Reference
        );
        assert!("fastest".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_mode_display_roundtrip() {
        for mode in [
            ExecutionMode::Auto,
            ExecutionMode::Fused,
            ExecutionMode::Reference,
        ] {
            assert_eq!(mode.to_string().parse::<ExecutionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_enum_serde() {
        assert_eq!(
            serde_json::from_str::<ExecutionMode>("\"reference\"").unwrap(),
            ExecutionMode::Reference
        );
        assert_eq!(
            serde_json::to_string(&ExecutionMode::Fused).unwrap(),
            "\"fused\""
        );
    }

    #[test]
    fn test_config_missing_mode_defaults() {
        let config: ForgetMultConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ForgetMultConfig::default());

        let config = ForgetMultConfig::default().with_mode(ExecutionMode::Fused);
        assert!(config.mode.allows_fused());
        assert!(!ExecutionMode::Reference.allows_fused());
    }
}

// ABOUTME: Integration tests for build specification normalization.
// ABOUTME: Interpolation through a lookup, args in list and map form, label merging.

use imagewright::build::*;
use std::collections::{BTreeMap, HashMap};

fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

fn parse(json: &str, vars: &[(&str, &str)]) -> Result<BuildConfig, BuildSpecError> {
    BuildSpec::parse(json, &BTreeMap::new(), &env(vars))
}

mod normalization {
    use super::*;

    #[test]
    fn minimal_spec() {
        let config = parse(r#"{"context": "./app"}"#, &[]).unwrap();
        assert_eq!(config.context, "./app");
        assert_eq!(config.dockerfile, DEFAULT_DOCKERFILE);
        assert!(config.args.is_empty());
        assert!(!config.no_cache);
        assert!(!config.pull);
        assert_eq!(config.target, None);
    }

    #[test]
    fn full_spec() {
        let config = parse(
            r#"{
                "context": "services/api",
                "dockerfile": "Dockerfile.prod",
                "args": {"VERSION": "1.2.3", "DEBUG": false, "WORKERS": 4},
                "labels": ["team=core", "tier"],
                "tags": ["ghcr.io/org/api:latest"],
                "target": "runtime",
                "network": "host",
                "no_cache": true,
                "pull": "yes",
                "platforms": ["linux/amd64"],
                "extra_hosts": {"db.internal": "10.0.0.5"},
                "shm_size": "256m",
                "cache_from": ["type=registry,ref=ghcr.io/org/api:cache"]
            }"#,
            &[],
        )
        .unwrap();

        assert_eq!(config.dockerfile, "Dockerfile.prod");
        assert_eq!(config.args["VERSION"].as_deref(), Some("1.2.3"));
        assert_eq!(config.args["DEBUG"].as_deref(), Some("false"));
        assert_eq!(config.args["WORKERS"].as_deref(), Some("4"));
        assert_eq!(config.labels["team"], "core");
        assert_eq!(config.labels["tier"], "");
        assert_eq!(config.tags, ["ghcr.io/org/api:latest"]);
        assert_eq!(config.target.as_deref(), Some("runtime"));
        assert_eq!(config.network.as_deref(), Some("host"));
        assert!(config.no_cache);
        assert!(config.pull);
        assert_eq!(config.platforms, ["linux/amd64"]);
        assert_eq!(config.extra_hosts, ["db.internal:10.0.0.5"]);
        assert_eq!(config.shm_size, Some(256 * 1024 * 1024));
    }

    #[test]
    fn declared_labels_override_spec_labels() {
        let extra = BTreeMap::from([
            ("team".to_string(), "platform".to_string()),
            ("owner".to_string(), "ops".to_string()),
        ]);
        let config = BuildSpec::parse(
            r#"{"context": ".", "labels": {"team": "core", "tier": "web"}}"#,
            &extra,
            &env(&[]),
        )
        .unwrap();

        assert_eq!(
            config.labels,
            BTreeMap::from([
                ("owner".to_string(), "ops".to_string()),
                ("team".to_string(), "platform".to_string()),
                ("tier".to_string(), "web".to_string()),
            ])
        );
    }

    #[test]
    fn missing_context_message() {
        let err = parse(r#"{"dockerfile": "Dockerfile"}"#, &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "build context not specified in build configuration"
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            parse(r#"{"context": "#, &[]),
            Err(BuildSpecError::InvalidJson(_))
        ));
    }
}

mod args {
    use super::*;

    #[test]
    fn list_form_values_come_from_environment() {
        let config = parse(
            r#"{"context": ".", "args": ["GIT_SHA", "UNSET_ARG", "MODE=release"]}"#,
            &[("GIT_SHA", "abc123")],
        )
        .unwrap();

        assert_eq!(config.args["GIT_SHA"].as_deref(), Some("abc123"));
        assert_eq!(config.args["UNSET_ARG"], None);
        assert_eq!(config.args["MODE"].as_deref(), Some("release"));
    }

    #[test]
    fn map_form_null_values_come_from_environment() {
        let config = parse(
            r#"{"context": ".", "args": {"GIT_SHA": null, "UNSET_ARG": null}}"#,
            &[("GIT_SHA", "abc123")],
        )
        .unwrap();

        assert_eq!(config.args["GIT_SHA"].as_deref(), Some("abc123"));
        assert_eq!(config.args["UNSET_ARG"], None);
    }

    #[test]
    fn values_are_split_on_first_equals() {
        let config = parse(r#"{"context": ".", "args": ["OPTS=a=b"]}"#, &[]).unwrap();
        assert_eq!(config.args["OPTS"].as_deref(), Some("a=b"));
    }
}

mod interpolation {
    use super::*;

    #[test]
    fn expands_variables_everywhere() {
        let config = parse(
            r#"{
                "context": "${APP_DIR}",
                "dockerfile": "$APP_DIR/Dockerfile",
                "args": {"VERSION": "v${VERSION:-dev}"},
                "tags": ["registry.local/app:${VERSION:-dev}"]
            }"#,
            &[("APP_DIR", "/src/app"), ("VERSION", "2.0")],
        )
        .unwrap();

        assert_eq!(config.context, "/src/app");
        assert_eq!(config.dockerfile, "/src/app/Dockerfile");
        assert_eq!(config.args["VERSION"].as_deref(), Some("v2.0"));
        assert_eq!(config.tags, ["registry.local/app:2.0"]);
    }

    #[test]
    fn dollar_escape_is_kept_literal() {
        let config = parse(
            r#"{"context": ".", "args": {"PRICE": "$$5"}}"#,
            &[],
        )
        .unwrap();
        assert_eq!(config.args["PRICE"].as_deref(), Some("$5"));
    }

    #[test]
    fn unset_variable_becomes_blank() {
        let config = parse(r#"{"context": "./${MISSING}app"}"#, &[]).unwrap();
        assert_eq!(config.context, "./app");
    }

    #[test]
    fn interpolated_booleans_are_accepted() {
        let config = parse(
            r#"{"context": ".", "no_cache": "${NO_CACHE}"}"#,
            &[("NO_CACHE", "true")],
        )
        .unwrap();
        assert!(config.no_cache);
    }

    #[test]
    fn required_variable_error_names_path() {
        let err = parse(
            r#"{"context": ".", "args": {"TOKEN": "${TOKEN:?token is required}"}}"#,
            &[],
        )
        .unwrap_err();

        match err {
            BuildSpecError::Interpolation { path, source } => {
                assert_eq!(path, "args.TOKEN");
                assert_eq!(
                    source,
                    InterpolationError::RequiredVariable {
                        name: "TOKEN".into(),
                        message: "token is required".into(),
                    }
                );
            }
            other => panic!("expected interpolation error, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_expression_is_an_error() {
        let err = parse(r#"{"context": "${APP_DIR"}"#, &[]).unwrap_err();
        assert!(matches!(
            err,
            BuildSpecError::Interpolation {
                source: InterpolationError::Unterminated { .. },
                ..
            }
        ));
    }
}

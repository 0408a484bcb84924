// ABOUTME: Integration tests for validated names, image references and runtime IDs.
// ABOUTME: Tests parsing, normalization and the rejected inputs.

use stackyard::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn bare_name_defaults_to_latest() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("latest"));
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
        assert_eq!(img.to_string(), "nginx:latest");
    }

    #[test]
    fn name_with_tag() {
        let img = ImageRef::parse("postgres:16-alpine").unwrap();
        assert_eq!(img.name(), "postgres");
        assert_eq!(img.tag(), Some("16-alpine"));
    }

    #[test]
    fn registry_with_port() {
        let img = ImageRef::parse("localhost:5000/team/api:v2").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "team/api");
        assert_eq!(img.tag(), Some("v2"));
        assert_eq!(img.to_string(), "localhost:5000/team/api:v2");
    }

    #[test]
    fn org_without_registry() {
        let img = ImageRef::parse("library/redis:7").unwrap();
        assert!(img.registry().is_none());
        assert_eq!(img.name(), "library/redis");
    }

    #[test]
    fn digest_without_tag() {
        let img = ImageRef::parse("nginx@sha256:abc123").unwrap();
        assert_eq!(img.digest(), Some("sha256:abc123"));
        assert!(img.tag().is_none());
        assert_eq!(img.to_string(), "nginx@sha256:abc123");
    }

    #[test]
    fn tag_and_digest() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1@sha256:abc123").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest(), Some("sha256:abc123"));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(ImageRef::parse("  redis:7 ").unwrap().to_string(), "redis:7");
    }

    #[test]
    fn rejected_references() {
        assert_eq!(ImageRef::parse(""), Err(ParseImageRefError::Empty));
        assert_eq!(
            ImageRef::parse("bad image"),
            Err(ParseImageRefError::InvalidChar(' '))
        );
        for input in ["nginx:", "nginx@", "/nginx", "org//repo"] {
            assert!(
                matches!(ImageRef::parse(input), Err(ParseImageRefError::InvalidFormat(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn from_str() {
        let img: ImageRef = "busybox:1.36".parse().unwrap();
        assert_eq!(img.tag(), Some("1.36"));
    }
}

mod network_alias_tests {
    use super::*;

    #[test]
    fn valid_alias_is_trimmed() {
        assert_eq!(NetworkAlias::new(" db ").unwrap().as_str(), "db");
        assert!(NetworkAlias::new("app_v2.internal").is_ok());
    }

    #[test]
    fn empty_or_blank() {
        assert_eq!(NetworkAlias::new(""), Err(NetworkAliasError::Empty));
        assert_eq!(NetworkAlias::new("   "), Err(NetworkAliasError::Empty));
    }

    #[test]
    fn invalid_chars() {
        assert_eq!(
            NetworkAlias::new("my service"),
            Err(NetworkAliasError::InvalidChar(' '))
        );
        assert_eq!(
            NetworkAlias::new("my:service"),
            Err(NetworkAliasError::InvalidChar(':'))
        );
    }
}

mod name_tests {
    use super::*;

    #[test]
    fn accepted_names() {
        for name in ["web", "db-1", "Api_2", "svc.internal", "9lives"] {
            assert_eq!(ServiceName::new(name).unwrap().as_str(), name);
        }
        assert!(ServiceName::new(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn empty() {
        assert_eq!(
            ServiceName::new(""),
            Err(NameError::Empty { kind: "service" })
        );
        assert_eq!(StackId::new(""), Err(NameError::Empty { kind: "stack" }));
    }

    #[test]
    fn too_long() {
        assert_eq!(
            StackId::new(&"a".repeat(64)),
            Err(NameError::TooLong { kind: "stack" })
        );
    }

    #[test]
    fn bad_start() {
        assert_eq!(
            ServiceName::new("-web"),
            Err(NameError::BadStart { kind: "service" })
        );
        assert!(StackId::new(".hidden").is_err());
    }

    #[test]
    fn invalid_char() {
        let err = StackId::new("my/stack").unwrap_err();
        assert_eq!(err, NameError::InvalidChar { kind: "stack", ch: '/' });
        assert_eq!(err.to_string(), "invalid character in stack name: '/'");
    }

    #[test]
    fn serde_validates() {
        let name: ServiceName = serde_json::from_str(r#""web""#).unwrap();
        assert_eq!(name.to_string(), "web");
        assert!(serde_json::from_str::<StackId>(r#""bad name""#).is_err());
        assert_eq!(serde_json::to_string(&name).unwrap(), r#""web""#);
    }

    #[test]
    fn service_name_is_its_alias() {
        let name = ServiceName::new("cache").unwrap();
        assert_eq!(name.as_alias().as_str(), "cache");
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn ids_keep_their_value() {
        let id = ContainerId::new("abc123".to_string());
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.clone().into_inner(), "abc123");

        let net: NetworkId = "net456".into();
        assert_eq!(net.as_str(), "net456");
    }

    #[test]
    fn ids_serialize_as_strings() {
        let id = ContainerId::new("abc".into());
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""abc""#);
        let back: ContainerId = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(back, id);
    }
}

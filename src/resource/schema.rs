// ABOUTME: Declarative attribute schema of the image resource, as printed for the engine.
// ABOUTME: Flags computed, required, force-replace and sensitive attributes.

use serde::Serialize;
use std::collections::BTreeMap;

pub const SCHEMA_VERSION: u32 = 0;

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub version: u32,
    pub description: &'static str,
    pub attributes: BTreeMap<&'static str, Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    StringMap,
    /// Nested block; at most one child may be set when `one_of` is true.
    Object,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub description: &'static str,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub computed: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub force_replace: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub use_state_for_unknown: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub one_of: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<&'static str, Attribute>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Attribute {
    fn new(kind: AttributeType, description: &'static str) -> Self {
        Self {
            kind,
            description,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            force_replace: false,
            use_state_for_unknown: false,
            one_of: false,
            default: None,
            attributes: BTreeMap::new(),
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn force_replace(mut self) -> Self {
        self.force_replace = true;
        self
    }

    fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    fn nested(mut self, one_of: bool, children: Vec<(&'static str, Attribute)>) -> Self {
        self.one_of = one_of;
        self.attributes = children.into_iter().collect();
        self
    }
}

/// Schema of the image resource.
pub fn image_resource_schema() -> Schema {
    use AttributeType::{Bool, Object, StringMap};

    let optional_string =
        |description: &'static str| Attribute::new(AttributeType::String, description).optional();

    let auth = Attribute::new(Object, "Authentication configuration for the container registry")
        .optional()
        .nested(
            true,
            vec![
                (
                    "aws_ecr",
                    Attribute::new(Object, "Authenticate with an Amazon ECR authorization token")
                        .optional()
                        .nested(
                            false,
                            vec![(
                                "profile",
                                optional_string("AWS profile to use for ECR authentication"),
                            )],
                        ),
                ),
                (
                    "google_artifact_registry",
                    Attribute::new(
                        Object,
                        "Use Google Application Default Credentials for authentication",
                    )
                    .optional(),
                ),
                (
                    "username_password",
                    Attribute::new(Object, "Username and password, literal or from a secret")
                        .optional()
                        .nested(
                            false,
                            vec![
                                (
                                    "username",
                                    optional_string(
                                        "Username for container registry authentication",
                                    ),
                                ),
                                (
                                    "password",
                                    optional_string(
                                        "Password for container registry authentication",
                                    )
                                    .sensitive(),
                                ),
                                (
                                    "aws_secrets_manager",
                                    optional_string(
                                        "ARN of AWS Secrets Manager secret containing username/password",
                                    ),
                                ),
                                (
                                    "google_secret_manager",
                                    optional_string(
                                        "Name of Google Secret Manager secret containing username/password",
                                    ),
                                ),
                            ],
                        ),
                ),
            ],
        );

    let attributes = vec![
        (
            "id",
            Attribute::new(AttributeType::String, "Image identifier")
                .computed()
                .use_state_for_unknown(),
        ),
        (
            "image_uri",
            Attribute::new(
                AttributeType::String,
                "URI of the image: registry/repository:tag or @digest",
            )
            .required()
            .force_replace(),
        ),
        (
            "build",
            Attribute::new(
                AttributeType::String,
                "Compose-style build specification in JSON",
            )
            .required(),
        ),
        (
            "labels",
            Attribute::new(StringMap, "Labels to apply to the image").optional(),
        ),
        (
            "triggers",
            Attribute::new(
                StringMap,
                "Arbitrary values that force the image to be rebuilt when changed",
            )
            .optional()
            .force_replace(),
        ),
        (
            "delete_image",
            Attribute::new(Bool, "Whether to delete the image when the resource is deleted")
                .optional()
                .computed()
                .default_value(serde_json::Value::Bool(false)),
        ),
        ("auth", auth),
        (
            "sha256_digest",
            Attribute::new(
                AttributeType::String,
                "SHA256 digest of the image in the registry",
            )
            .computed(),
        ),
    ];

    Schema {
        version: SCHEMA_VERSION,
        description: "Builds a container image and pushes it to a registry",
        attributes: attributes.into_iter().collect(),
    }
}

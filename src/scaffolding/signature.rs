use serde::{Deserialize, Serialize};
use std::fmt;

/// Method signature convention a function implements, combined with its
/// invocation style. The string forms name scaffolding directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Signature {
    InstancedHttp,
    InstancedCloudevents,
    StaticHttp,
    StaticCloudevents,
    Unknown,
}

impl Signature {
    /// Combine the detected convention with an invocation hint.
    ///
    /// An empty hint means "http"; any hint other than "http" or
    /// "cloudevent" yields [`Signature::Unknown`].
    pub fn from_parts(instanced: bool, invoke: &str) -> Self {
        match (instanced, invoke) {
            (true, "" | "http") => Signature::InstancedHttp,
            (true, "cloudevent") => Signature::InstancedCloudevents,
            (false, "" | "http") => Signature::StaticHttp,
            (false, "cloudevent") => Signature::StaticCloudevents,
            _ => Signature::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signature::InstancedHttp => "instanced-http",
            Signature::InstancedCloudevents => "instanced-cloudevents",
            Signature::StaticHttp => "static-http",
            Signature::StaticCloudevents => "static-cloudevents",
            Signature::Unknown => "unknown",
        }
    }

    pub fn is_cloudevents(&self) -> bool {
        matches!(
            self,
            Signature::InstancedCloudevents | Signature::StaticCloudevents
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        instanced_default = { true, "", Signature::InstancedHttp },
        instanced_http = { true, "http", Signature::InstancedHttp },
        instanced_event = { true, "cloudevent", Signature::InstancedCloudevents },
        static_default = { false, "", Signature::StaticHttp },
        static_event = { false, "cloudevent", Signature::StaticCloudevents },
        plural_hint = { true, "cloudevents", Signature::Unknown },
        bogus_hint = { false, "grpc", Signature::Unknown },
    )]
    fn test_from_parts(instanced: bool, invoke: &str, expected: Signature) {
        assert_eq!(Signature::from_parts(instanced, invoke), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(Signature::InstancedCloudevents.to_string(), "instanced-cloudevents");
        assert_eq!(Signature::Unknown.to_string(), "unknown");
    }
}

//! IBC connection version negotiation.

use ibc_proto::ibc::core::connection::v1::Version;
use serde::{Deserialize, Serialize};

use crate::connection::ConnectionError;

/// The single IBC connection version this chain speaks.
pub const DEFAULT_IBC_VERSION_IDENTIFIER: &str = "1";

/// Channel orderings advertised as connection features.
const SUPPORTED_FEATURES: [&str; 2] = ["ORDER_ORDERED", "ORDER_UNORDERED"];

/// The connection versions compatible with this chain, in preference order.
#[must_use]
pub fn compatible_versions() -> Vec<Version> {
    vec![Version {
        identifier: DEFAULT_IBC_VERSION_IDENTIFIER.to_string(),
        features: SUPPORTED_FEATURES.iter().map(ToString::to_string).collect(),
    }]
}

/// Whether `candidate` matches one of `supported` by identifier with every
/// feature admitted by that supported version.
#[must_use]
pub fn is_supported_version(supported: &[Version], candidate: &Version) -> bool {
    supported.iter().any(|version| {
        version.identifier == candidate.identifier
            && candidate
                .features
                .iter()
                .all(|feature| version.features.contains(feature))
    })
}

/// Selects the connection version for the TRYOPEN end: the first supported
/// version the counterparty also offers, restricted to the feature
/// intersection. An empty intersection (or an empty counterparty list) means
/// no version can be agreed on.
///
/// # Errors
/// Returns [`ConnectionError::NoCommonVersion`] when no version overlaps.
pub fn pick_version(
    supported: &[Version],
    counterparty_versions: &[Version],
) -> Result<Version, ConnectionError> {
    for version in supported {
        if let Some(counterparty) = counterparty_versions
            .iter()
            .find(|candidate| candidate.identifier == version.identifier)
        {
            let features: Vec<String> = counterparty
                .features
                .iter()
                .filter(|feature| version.features.contains(feature))
                .cloned()
                .collect();
            if !features.is_empty() {
                return Ok(Version {
                    identifier: version.identifier.clone(),
                    features,
                });
            }
        }
    }
    Err(ConnectionError::NoCommonVersion)
}

/// Wire form of a connection version in the `connOpenTry` payload, which
/// transports the counterparty's version list as a JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct VersionJson {
    /// Version identifier.
    pub identifier: String,
    /// Feature set; defaults to empty.
    #[serde(default)]
    pub features: Vec<String>,
}

/// Decodes the JSON-encoded counterparty version list.
///
/// # Errors
/// Returns [`ConnectionError::Decode`] on malformed JSON.
pub fn decode_version_list(bytes: &[u8]) -> Result<Vec<Version>, ConnectionError> {
    let versions: Vec<VersionJson> = serde_json::from_slice(bytes)
        .map_err(|_| ConnectionError::Decode("counterparty versions"))?;
    Ok(versions
        .into_iter()
        .map(|version| Version {
            identifier: version.identifier,
            features: version.features,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use ibc_proto::ibc::core::connection::v1::Version;

    use super::{
        compatible_versions, decode_version_list, is_supported_version, pick_version,
    };
    use crate::connection::ConnectionError;

    fn version(identifier: &str, features: &[&str]) -> Version {
        Version {
            identifier: identifier.to_string(),
            features: features.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn default_version_is_self_supported() {
        let compatible = compatible_versions();
        assert!(is_supported_version(&compatible, &compatible[0]));
    }

    #[test]
    fn foreign_identifier_is_unsupported() {
        assert!(!is_supported_version(
            &compatible_versions(),
            &version("2", &["ORDER_ORDERED"])
        ));
    }

    #[test]
    fn unknown_feature_is_unsupported() {
        assert!(!is_supported_version(
            &compatible_versions(),
            &version("1", &["ORDER_DAG"])
        ));
    }

    #[test]
    fn pick_version_intersects_features() {
        let picked = pick_version(
            &compatible_versions(),
            &[version("1", &["ORDER_ORDERED", "ORDER_DAG"])],
        )
        .unwrap();
        assert_eq!("1", picked.identifier);
        assert_eq!(vec!["ORDER_ORDERED".to_string()], picked.features);
    }

    #[test]
    fn pick_version_fails_on_empty_counterparty_list() {
        let err = pick_version(&compatible_versions(), &[]).unwrap_err();
        assert!(matches!(err, ConnectionError::NoCommonVersion));
    }

    #[test]
    fn pick_version_fails_on_disjoint_features() {
        let err = pick_version(&compatible_versions(), &[version("1", &["ORDER_DAG"])])
            .unwrap_err();
        assert!(matches!(err, ConnectionError::NoCommonVersion));
    }

    #[test]
    fn version_list_json_round_trip() {
        let json = br#"[{"identifier":"1","features":["ORDER_ORDERED","ORDER_UNORDERED"]}]"#;
        let versions = decode_version_list(json).unwrap();
        assert_eq!(1, versions.len());
        assert_eq!("1", versions[0].identifier);
        assert_eq!(2, versions[0].features.len());
    }

    #[test]
    fn version_list_rejects_malformed_json() {
        assert!(matches!(
            decode_version_list(b"not json").unwrap_err(),
            ConnectionError::Decode(_)
        ));
    }
}

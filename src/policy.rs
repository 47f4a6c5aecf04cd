use serde::Serialize;

use crate::{endpoint::Endpoint, error::PolicyError};

/// Provider-specific property carrying a weighted-routing weight.
pub const AWS_WEIGHT_PROPERTY: &str = "aws/weight";

pub const MIN_WEIGHT: i64 = 0;
pub const MAX_WEIGHT: i64 = 255;
pub const MAX_SET_IDENTIFIER_LENGTH: usize = 128;

/// Weighted routing attributes for Route53-style backends.
///
/// Only obtainable through [`AwsRoute53Policy::new`], so every value in
/// circulation has a weight in 0..=255 and a 1-128 character identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsRoute53Policy {
    weight: i64,
    set_identifier: String,
}

impl AwsRoute53Policy {
    pub fn new(weight: i64, set_identifier: &str) -> Result<Self, PolicyError> {
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
            return Err(PolicyError::WeightOutOfRange(weight));
        }
        let len = set_identifier.chars().count();
        if !(1..=MAX_SET_IDENTIFIER_LENGTH).contains(&len) {
            return Err(PolicyError::SetIdentifierLength(len));
        }
        Ok(Self { weight, set_identifier: set_identifier.to_string() })
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    pub fn set_identifier(&self) -> &str {
        &self.set_identifier
    }
}

/// Routing policy attached to an endpoint. The default value means "no
/// policy".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_route53: Option<AwsRoute53Policy>,
}

impl Policy {
    pub fn aws_route53(policy: AwsRoute53Policy) -> Self {
        Self { aws_route53: Some(policy) }
    }

    /// Read the routing policy an endpoint asks for through its
    /// `aws/weight` property and set identifier.
    pub fn from_endpoint(ep: &Endpoint) -> Result<Self, PolicyError> {
        let Some(raw) = ep.provider_specific_property(AWS_WEIGHT_PROPERTY) else {
            return Ok(Self::default());
        };
        let weight = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| PolicyError::UnparsableWeight(raw.to_string()))?;
        Ok(Self::aws_route53(AwsRoute53Policy::new(weight, &ep.set_identifier)?))
    }

    /// True only for an attached policy with a non-negative weight and a
    /// non-empty identifier.
    pub fn has_aws_route53_policy(&self) -> bool {
        self.aws_route53
            .as_ref()
            .is_some_and(|p| p.weight >= 0 && !p.set_identifier.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::RECORD_TYPE_A;

    #[test]
    fn weight_boundaries() {
        assert!(AwsRoute53Policy::new(0, "a").is_ok());
        assert!(AwsRoute53Policy::new(255, "a").is_ok());
        assert_eq!(AwsRoute53Policy::new(256, "a"), Err(PolicyError::WeightOutOfRange(256)));
        assert_eq!(AwsRoute53Policy::new(-1, "a"), Err(PolicyError::WeightOutOfRange(-1)));
    }

    #[test]
    fn set_identifier_boundaries() {
        assert_eq!(AwsRoute53Policy::new(1, ""), Err(PolicyError::SetIdentifierLength(0)));
        assert!(AwsRoute53Policy::new(1, &"a".repeat(128)).is_ok());
        assert_eq!(
            AwsRoute53Policy::new(1, &"a".repeat(129)),
            Err(PolicyError::SetIdentifierLength(129))
        );
        // characters, not bytes
        assert!(AwsRoute53Policy::new(1, &"é".repeat(128)).is_ok());
    }

    #[test]
    fn weight_is_checked_before_identifier() {
        assert_eq!(AwsRoute53Policy::new(300, ""), Err(PolicyError::WeightOutOfRange(300)));
    }

    #[test]
    fn default_policy_reads_as_absent() {
        assert!(!Policy::default().has_aws_route53_policy());
        let policy = Policy::aws_route53(AwsRoute53Policy::new(0, "blue").unwrap());
        assert!(policy.has_aws_route53_policy());
    }

    #[test]
    fn from_endpoint() {
        let ep = Endpoint::new("a.example.org", RECORD_TYPE_A, ["1.2.3.4"]);
        assert_eq!(Policy::from_endpoint(&ep), Ok(Policy::default()));

        let weighted = ep
            .clone()
            .with_set_identifier("blue")
            .with_provider_specific(AWS_WEIGHT_PROPERTY, "10");
        let policy = Policy::from_endpoint(&weighted).unwrap();
        assert!(policy.has_aws_route53_policy());
        let route53 = policy.aws_route53.unwrap();
        assert_eq!(route53.weight(), 10);
        assert_eq!(route53.set_identifier(), "blue");

        let no_id = ep.clone().with_provider_specific(AWS_WEIGHT_PROPERTY, "10");
        assert_eq!(Policy::from_endpoint(&no_id), Err(PolicyError::SetIdentifierLength(0)));

        let garbage = ep
            .with_set_identifier("blue")
            .with_provider_specific(AWS_WEIGHT_PROPERTY, "heavy");
        assert_eq!(
            Policy::from_endpoint(&garbage),
            Err(PolicyError::UnparsableWeight("heavy".into()))
        );
    }
}

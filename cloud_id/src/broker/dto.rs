//! Request bodies sent to the identity service token endpoints

use aliri::jwt;
use serde::{Serialize, Serializer};

use crate::{ApiTokenNameRef, ApiTokenSecretRef, ClientIdRef, ClientSecretRef};

/// Exchanges an API token for an access token
#[derive(Debug, Serialize)]
pub(super) struct ApiTokenRequest<'a> {
    pub name: &'a ApiTokenNameRef,
    pub secret: &'a ApiTokenSecretRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<&'a jwt::AudienceRef>,
}

/// Performs the client credentials flow
#[derive(Debug)]
pub(super) struct ClientCredentialsRequest<'a> {
    pub client_id: &'a ClientIdRef,
    pub client_secret: &'a ClientSecretRef,
    pub aud: &'a jwt::AudienceRef,
}

impl Serialize for ClientCredentialsRequest<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("ClientCredentialsRequest", 4)?;
        ser.serialize_field("client_id", self.client_id)?;
        ser.serialize_field("client_secret", self.client_secret)?;
        ser.serialize_field("aud", self.aud)?;
        ser.serialize_field("grant_type", "client_credentials")?;
        ser.end()
    }
}

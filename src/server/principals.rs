//! Resource view over the principals themselves

use crate::core::auth::{CredentialVerifier, Principal};
use crate::core::error::ViewError;
use crate::core::repository::{Changes, Repository};
use crate::core::resource::Ownership;
use crate::server::view::ResourceView;
use serde_json::Value;
use std::sync::Arc;

/// View exposing principals under `/users`
///
/// Privileged-only by default. Listing returns only the caller's own record
/// while count and lookups cover every principal. Creation hashes the
/// submitted password, and only a privileged caller may create another
/// privileged principal.
pub fn principal_view(
    repository: Arc<dyn Repository<Principal>>,
    verifier: Arc<dyn CredentialVerifier>,
) -> ResourceView<Principal> {
    ResourceView::new("/users", repository)
        .ownership(Ownership::Principal)
        .privileged_only(true)
        .on_create(move |call, payload| {
            let verifier = verifier.clone();
            async move {
                let hashed_password = verifier.hash(&payload.password)?;
                let caller_is_privileged = call.principal.as_ref().is_some_and(|p| p.is_superuser);

                if payload.is_superuser && !caller_is_privileged {
                    return Err(ViewError::Forbidden);
                }

                let mut fields = Changes::new();
                fields.insert("email".to_string(), Value::String(payload.email));
                fields.insert(
                    "hashed_password".to_string(),
                    Value::String(hashed_password),
                );
                fields.insert("is_superuser".to_string(), Value::Bool(payload.is_superuser));

                Ok(call.repository.insert(fields).await?)
            }
        })
}

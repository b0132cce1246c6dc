use tracing::instrument;

use choco_bliss_core::UserId;

use super::client::{Credential, SupabaseClient};
use super::query::Query;
use super::types::Profile;
use super::SupabaseError;

impl SupabaseClient {
    /// The customer's profile row, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend request fails.
    #[instrument(skip(self, credential), fields(user_id = %user_id))]
    pub async fn profile(
        &self,
        credential: Credential<'_>,
        user_id: UserId,
    ) -> Result<Option<Profile>, SupabaseError> {
        let rows: Vec<Profile> = self
            .select(
                credential,
                "profiles",
                &Query::new()
                    .select("id,full_name,email,phone")
                    .eq("id", user_id)
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

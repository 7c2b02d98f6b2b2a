//! Query orchestrator: retrieve → rerank → synthesize.

use crate::error::PipelineError;
use crate::models::QueryResponse;
use crate::pipeline::Pipeline;

impl Pipeline {
    /// Answer `query_text` from `user_id`'s indexed documents, with cited
    /// sources.
    pub async fn answer(
        &self,
        user_id: &str,
        query_text: &str,
    ) -> Result<QueryResponse, PipelineError> {
        let candidates = self.retrieve(user_id, query_text).await?;
        tracing::debug!(
            "Retrieved {} candidates for user {user_id}",
            candidates.len()
        );

        let ranked = self.rerank(query_text, candidates).await?;
        self.synthesize(query_text, &ranked).await
    }
}

use anyhow::{Context, Result};

use crate::advisor::{EncodedImage, ModelAdvisor, IMAGE_PROMPT};
use crate::dataset::LoadedDataset;
use crate::retriever::{retrieve, retrieve_batch};

const GREETING: &str = "Hello! I'm ready to analyse your menu.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub role: Role,
    pub content: String,
}

/// In-memory conversation history for one interactive session. Created with
/// a greeting, appended to on each successful interaction, cleared on an
/// explicit user action. Nothing is persisted.
#[derive(Debug)]
pub struct Session {
    messages: Vec<ConversationEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            messages: vec![ConversationEntry {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
        }
    }

    pub fn messages(&self) -> &[ConversationEntry] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.messages.push(ConversationEntry {
            role: Role::Assistant,
            content: GREETING.to_string(),
        });
    }

    fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(ConversationEntry {
            role,
            content: content.into(),
        });
    }
}

/// Outcome of one free-text interaction. `reply` is present only when at
/// least one food matched and the summarizer answered.
#[derive(Debug, Default)]
pub struct InteractionReport {
    pub detected: Vec<String>,
    pub not_found: Vec<String>,
    pub reply: Option<String>,
}

/// Outcome of one photo interaction.
#[derive(Debug)]
pub struct ImageInteractionReport {
    pub detected: String,
    pub matched: Option<String>,
    pub reply: Option<String>,
}

/// Runs one text interaction: extract the mentioned foods, retrieve their
/// nutrition data, and summarize what was found.
///
/// Not-found foods are accumulated in the report and never abort the rest
/// of the batch. The conversation only grows when a summary is produced;
/// a failing model call surfaces as an error and leaves the history
/// untouched.
pub async fn analyze_text(
    session: &mut Session,
    dataset: &LoadedDataset,
    advisor: &dyn ModelAdvisor,
    text: &str,
    top_k: usize,
) -> Result<InteractionReport> {
    let detected = advisor
        .extract_foods(text, &dataset.food_names)
        .await
        .context("Failed to extract food names from the sentence")?;

    let batch = retrieve_batch(&dataset.table, &detected, top_k);
    let mut report = InteractionReport {
        detected,
        not_found: batch.not_found.clone(),
        reply: None,
    };

    if !batch.found.is_empty() {
        let reply = advisor
            .summarize(&batch.aggregated_context(), &batch.found_names())
            .await
            .context("Failed to generate the nutrition summary")?;
        session.push(Role::User, text);
        session.push(Role::Assistant, reply.clone());
        report.reply = Some(reply);
    }

    Ok(report)
}

/// Runs one photo interaction: identify the food in the image, retrieve its
/// data, and summarize. A food that is identified but absent from the
/// dataset is reported without adding conversation entries.
pub async fn analyze_image(
    session: &mut Session,
    dataset: &LoadedDataset,
    advisor: &dyn ModelAdvisor,
    image: &EncodedImage,
    top_k: usize,
) -> Result<ImageInteractionReport> {
    let detected = advisor
        .identify_food(image, IMAGE_PROMPT)
        .await
        .context("Failed to identify the food in the image")?;

    match retrieve(&dataset.table, &detected, top_k) {
        Some(hit) => {
            let reply = advisor
                .summarize(&hit.context_block, std::slice::from_ref(&detected))
                .await
                .context("Failed to generate the nutrition summary")?;
            session.push(
                Role::User,
                format!("Nutrition analysis from image (identified: {}).", detected),
            );
            session.push(Role::Assistant, reply.clone());
            Ok(ImageInteractionReport {
                detected,
                matched: Some(hit.matched_name),
                reply: Some(reply),
            })
        }
        None => Ok(ImageInteractionReport {
            detected,
            matched: None,
            reply: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_connection::connection::ApiConnectionError;
    use crate::dataset::load_nutrition_data;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct StubAdvisor {
        extracted: Vec<String>,
        identified: String,
        fail_summary: bool,
    }

    impl StubAdvisor {
        fn extracting(foods: &[&str]) -> Self {
            Self {
                extracted: foods.iter().map(|s| s.to_string()).collect(),
                identified: String::new(),
                fail_summary: false,
            }
        }

        fn identifying(food: &str) -> Self {
            Self {
                extracted: Vec::new(),
                identified: food.to_string(),
                fail_summary: false,
            }
        }
    }

    #[async_trait]
    impl ModelAdvisor for StubAdvisor {
        async fn extract_foods(
            &self,
            _text: &str,
            _known_names: &[String],
        ) -> Result<Vec<String>, ApiConnectionError> {
            Ok(self.extracted.clone())
        }

        async fn identify_food(
            &self,
            _image: &EncodedImage,
            _prompt: &str,
        ) -> Result<String, ApiConnectionError> {
            Ok(self.identified.clone())
        }

        async fn summarize(
            &self,
            context: &str,
            display_names: &[String],
        ) -> Result<String, ApiConnectionError> {
            if self.fail_summary {
                return Err(ApiConnectionError::ApiError {
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    error_body: "boom".to_string(),
                });
            }
            Ok(format!(
                "summary of {} using {} stanzas",
                display_names.join(", "),
                context.matches("---").count()
            ))
        }
    }

    fn sample_dataset() -> Result<LoadedDataset> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "Food,Measure,Calories,Protein,Fat,Carbs")?;
        writeln!(file, "Opor Ayam,1 bowl,163,12.4,10.6,3.9")?;
        writeln!(file, "Nasi Goreng,1 plate,350,8.5,12,45")?;
        file.flush()?;
        load_nutrition_data(&[file.path().to_path_buf()])
    }

    #[tokio::test]
    async fn test_text_analysis_appends_one_exchange() -> Result<()> {
        let dataset = sample_dataset()?;
        let advisor = StubAdvisor::extracting(&["opor", "pizza"]);
        let mut session = Session::new();

        let report =
            analyze_text(&mut session, &dataset, &advisor, "I had opor and pizza", 1).await?;

        assert_eq!(report.detected, vec!["opor", "pizza"]);
        assert_eq!(report.not_found, vec!["pizza"]);
        assert_eq!(report.reply.as_deref(), Some("summary of opor using 1 stanzas"));
        // greeting + user turn + assistant turn
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[1].role, Role::User);
        assert_eq!(session.messages()[2].role, Role::Assistant);
        Ok(())
    }

    #[tokio::test]
    async fn test_text_analysis_with_no_matches_adds_nothing() -> Result<()> {
        let dataset = sample_dataset()?;
        let advisor = StubAdvisor::extracting(&["pizza", "sushi"]);
        let mut session = Session::new();

        let report = analyze_text(&mut session, &dataset, &advisor, "pizza and sushi", 1).await?;

        assert!(report.reply.is_none());
        assert_eq!(report.not_found, vec!["pizza", "sushi"]);
        assert_eq!(session.messages().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_summary_leaves_history_untouched() -> Result<()> {
        let dataset = sample_dataset()?;
        let mut advisor = StubAdvisor::extracting(&["opor"]);
        advisor.fail_summary = true;
        let mut session = Session::new();

        let result = analyze_text(&mut session, &dataset, &advisor, "opor", 1).await;
        assert!(result.is_err());
        assert_eq!(session.messages().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_image_analysis_matches_and_replies() -> Result<()> {
        let dataset = sample_dataset()?;
        let advisor = StubAdvisor::identifying("nasi goreng");
        let mut session = Session::new();
        let image = EncodedImage::new("image/jpeg", vec![0xFF]);

        let report = analyze_image(&mut session, &dataset, &advisor, &image, 1).await?;

        assert_eq!(report.detected, "nasi goreng");
        assert_eq!(report.matched.as_deref(), Some("Nasi Goreng"));
        assert!(report.reply.is_some());
        assert_eq!(session.messages().len(), 3);
        assert!(session.messages()[1]
            .content
            .contains("identified: nasi goreng"));
        Ok(())
    }

    #[tokio::test]
    async fn test_image_analysis_miss_reports_without_entries() -> Result<()> {
        let dataset = sample_dataset()?;
        let advisor = StubAdvisor::identifying("pizza");
        let mut session = Session::new();
        let image = EncodedImage::new("image/jpeg", vec![0xFF]);

        let report = analyze_image(&mut session, &dataset, &advisor, &image, 1).await?;

        assert_eq!(report.detected, "pizza");
        assert!(report.matched.is_none());
        assert!(report.reply.is_none());
        assert_eq!(session.messages().len(), 1);
        Ok(())
    }

    #[test]
    fn test_clear_resets_to_greeting() {
        let mut session = Session::new();
        session.push(Role::User, "hello");
        session.clear();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::Assistant);
    }
}

use handlebars::Handlebars;
use serde_json::json;

use crate::{
    error::AppResult,
    models::{CatalogMetadata, Prediction, TitleInput},
};

const PAGE: &str = "index";
const TEMPLATE: &str = include_str!("../../templates/index.html");

/// What to show under the form
#[derive(Debug, Clone)]
pub enum Outcome {
    Empty,
    Predicted(Prediction),
    Failed(String),
}

/// Form page renderer; the template is compiled once at startup
pub struct PageRenderer {
    registry: Handlebars<'static>,
}

impl PageRenderer {
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();
        registry.register_template_string(PAGE, TEMPLATE)?;
        Ok(Self { registry })
    }

    /// Renders the page with the echoed form values and the outcome
    ///
    /// Every value goes through the registry's HTML escaping.
    pub fn render(
        &self,
        input: Option<&TitleInput>,
        outcome: &Outcome,
        metadata: &CatalogMetadata,
    ) -> AppResult<String> {
        let empty = TitleInput::default();
        let form = input.unwrap_or(&empty);

        let (prediction, error) = match outcome {
            Outcome::Empty => (None, None),
            Outcome::Predicted(prediction) => (
                Some(json!({
                    "label": prediction.label,
                    "percent": format!("{:.1}", prediction.confidence * 100.0),
                })),
                None,
            ),
            Outcome::Failed(message) => (None, Some(message.as_str())),
        };

        let context = json!({
            "form": form,
            "metadata": metadata,
            "prediction": prediction,
            "error": error,
        });
        Ok(self.registry.render(PAGE, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> CatalogMetadata {
        CatalogMetadata {
            ratings: vec!["PG-13".to_string()],
            genres: vec!["Dramas".to_string()],
            countries: vec!["India".to_string(), "Côte d'Ivoire".to_string()],
        }
    }

    fn renderer() -> PageRenderer {
        PageRenderer::new().unwrap()
    }

    #[test]
    fn test_empty_page_has_no_result() {
        let html = renderer().render(None, &Outcome::Empty, &metadata()).unwrap();
        assert!(html.contains("<form"));
        assert!(!html.contains("class=\"result\""));
        assert!(!html.contains("class=\"error\""));
        assert!(html.contains("<option value=\"PG-13\"></option>"));
        assert!(html.contains("<option value=\"Dramas\"></option>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_datalist_values_are_escaped() {
        let html = renderer().render(None, &Outcome::Empty, &metadata()).unwrap();
        assert!(html.contains("<option value=\"Côte d&#x27;Ivoire\"></option>"));
    }

    #[test]
    fn test_prediction_is_shown_with_echoed_input() {
        let input = TitleInput {
            title: "<Roma>".to_string(),
            release_year: "2018".to_string(),
            listed_in: "Dramas, \"Comedies\"".to_string(),
            ..Default::default()
        };
        let outcome = Outcome::Predicted(Prediction {
            label: "Movie".to_string(),
            confidence: 0.875,
        });

        let html = renderer().render(Some(&input), &outcome, &metadata()).unwrap();
        assert!(html.contains("<strong>Movie</strong> with 87.5% confidence"));
        assert!(html.contains("value=\"&lt;Roma&gt;\""));
        assert!(html.contains("value=\"2018\""));
        assert!(html.contains("value=\"Dramas, &quot;Comedies&quot;\""));
    }

    #[test]
    fn test_echoed_input_is_not_rendered_as_template() {
        let input = TitleInput {
            title: "{{metadata.ratings}}".to_string(),
            ..Default::default()
        };
        let html = renderer().render(Some(&input), &Outcome::Empty, &metadata()).unwrap();
        assert!(html.contains("value=\"{{metadata.ratings}}\""));
    }

    #[test]
    fn test_error_is_shown() {
        let outcome = Outcome::Failed("Unknown rating <b>".to_string());
        let html = renderer().render(None, &outcome, &metadata()).unwrap();
        assert!(html.contains("<div class=\"error\">Unknown rating &lt;b&gt;</div>"));
        assert!(!html.contains("class=\"result\""));
    }
}

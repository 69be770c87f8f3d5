use crate::classifier::Prediction;

const PERSONA: &str = "You are an expert neurologist interpreting a saliency map for a brain MRI scan, \
generated by a deep learning model trained to classify brain tumors into categories: \
glioma, meningioma, pituitary, or no tumor.";

fn confidence_pct(prediction: &Prediction) -> String {
    format!("{:.2}%", prediction.confidence * 100.0)
}

/// Prompt for the first explanation, sent together with the saliency overlay.
pub fn explanation_prompt(prediction: &Prediction) -> String {
    let class = prediction.class.label();
    format!(
        "{persona}

The model predicted the scan to be of class '{class}' with a confidence level of {conf}.

Context for response:
- Describe specific regions of the brain highlighted in the saliency map where the model focused to arrive at this prediction. Reference specific lobes, sulci, or anatomical structures if they appear relevant.
- Discuss how the highlighted regions correlate with typical tumor presentation of the predicted class, and whether the distribution, shape, or spread of these areas aligns with known patterns for {class}.
- Mention whether the model appears to emphasize regions of abnormal density, asymmetry, or unusual boundaries that are often seen in {class} cases.
- Avoid generic statements; make each sentence contribute a unique insight into why the model likely made this prediction based on the observed highlights.
- Keep the anatomical and functional relevance of the model's focus points clear and precise.

Based on the above context, explain the prediction in a detailed yet concise manner.",
        persona = PERSONA,
        class = class,
        conf = confidence_pct(prediction),
    )
}

/// Prompt for one follow-up question, sent together with the original scan.
pub fn chat_prompt(prediction: &Prediction, question: &str) -> String {
    let class = prediction.class.label();
    format!(
        "{persona}

The model has classified this MRI scan as '{class}' with a confidence level of {conf}.

When responding, please:
- Answer questions directly based on the provided MRI scan classification and the highlighted regions in the saliency map.
- Focus on explaining why the model might have classified the tumor as {class}, including anatomical and structural details relevant to this tumor type.
- Describe relevant characteristics of the {class} tumor type, such as typical regions affected, common shapes, or patterns in MRI imaging.
- Avoid disclaimers about being an AI and focus on educational information relevant to this classification.

Now, based on the model's classification and the saliency map, answer the following user question:

\"{question}\"",
        persona = PERSONA,
        class = class,
        conf = confidence_pct(prediction),
        question = question.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction() -> Prediction {
        Prediction::from_scores(&[0.05, 0.87, 0.05, 0.03]).unwrap()
    }

    #[test]
    fn test_explanation_mentions_class_and_confidence() {
        let prompt = explanation_prompt(&prediction());
        assert!(prompt.contains("'Meningioma'"));
        assert!(prompt.contains("87.00%"));
    }

    #[test]
    fn test_chat_prompt_quotes_question() {
        let prompt = chat_prompt(&prediction(), "  Where is the lesion?\n");
        assert!(prompt.ends_with("\"Where is the lesion?\""));
        assert!(prompt.contains("classified this MRI scan as 'Meningioma'"));
    }
}

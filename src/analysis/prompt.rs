use crate::store::{Category, Topic};
use crate::util::sanitize::truncate_chars;

/// Characters of article content sent to the model.
pub const CONTENT_LIMIT: usize = 2500;

pub fn relevancy_section(topics: &[Topic]) -> String {
    if topics.is_empty() {
        return String::new();
    }
    let mut section = String::from(
        "\n\nRELEVANCY CRITERIA:\nThe article should be related to these topics and keywords:\n",
    );
    for topic in topics {
        section.push_str(&format!("- {}: {}\n", topic.name, topic.keywords));
    }
    section.push_str(
        "\nScore the relevancy (0-100) based on how well the article relates to these topics. \
         Score 75+ if clearly relevant, 50-74 if somewhat related, below 50 if not related.",
    );
    section
}

pub fn build_prompt(
    title: &str,
    author: &str,
    content: &str,
    categories: &[Category],
    topics: &[Topic],
) -> String {
    let categories_text = categories
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let content = truncate_chars(content, CONTENT_LIMIT);
    let relevancy = relevancy_section(topics);

    format!(
        r#"Analyze this article and create an executive briefing.

Title: {title}
Author: {author}
Content: {content}{relevancy}

Create a unified list of 4-5 bulleted statements merging key facts and quotes.
Avoid redundant information.

Match against Categories: {categories_text}

IMPORTANT RULES:
1. Return ONLY valid JSON, no explanatory text before or after
2. The "category" field MUST be EXACTLY one of these values: {categories_text}
3. Do NOT create new category names or use variations
4. If the article doesn't match any category well, use an empty string ""
5. For "author" field: Extract the author name from the content if the provided Author is empty/unknown. Look for bylines like "By [Name]", "Written by [Name]", author attributions, or reporter names. If no author can be found, return empty string ""

Return JSON with:
- "bullets": list of summary bullets (empty array if not relevant)
- "category": MUST be exactly one of [{categories_text}] or empty string
- "relevancy_score": integer (0-100) representing how relevant the article is to the topics and categories
- "author": extracted author name from content (if Author field is empty/unknown), or empty string "" if no author found

Return ONLY this JSON format:
{{"bullets": ["Bullet 1", "Bullet 2", ...], "category": "category_name", "relevancy_score": 85, "author": "Author Name"}}"#
    )
}

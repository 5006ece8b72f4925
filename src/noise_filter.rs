use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};
use tracing::info;

use crate::error::StageError;
use crate::model::TextFragment;
use crate::providers::Provider;

const PROMPT_TEMPLATE: &str = include_str!("prompts/noise_filter.tera");

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub kept: Vec<TextFragment>,
    pub filtered_count: usize,
}

impl FilterOutcome {
    pub fn keep_all(fragments: Vec<TextFragment>) -> Self {
        Self {
            kept: fragments,
            filtered_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeepSet {
    All,
    Nothing,
    Indices(BTreeSet<usize>),
}

/// Asks a reasoning provider which fragments on a slide are real content.
#[derive(Clone)]
pub struct NoiseFilter {
    provider: Arc<dyn Provider>,
}

impl NoiseFilter {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub async fn filter(&self, fragments: &[TextFragment]) -> Result<FilterOutcome, StageError> {
        if fragments.is_empty() {
            return Ok(FilterOutcome::keep_all(Vec::new()));
        }
        let texts: Vec<&str> = fragments.iter().map(TextFragment::text).collect();
        let prompt = render_prompt(&texts).map_err(StageError::reasoning)?;
        let response = self
            .provider
            .complete(prompt)
            .await
            .map_err(StageError::reasoning)?;
        info!("{} filter response: {}", self.provider.name(), response);

        let keep = parse_keep_indices(&response, fragments.len())?;
        let mut kept = Vec::new();
        let mut filtered_count = 0;
        for (idx, fragment) in fragments.iter().enumerate() {
            let keep_it = match &keep {
                KeepSet::All => true,
                KeepSet::Nothing => false,
                KeepSet::Indices(indices) => indices.contains(&idx),
            };
            if keep_it {
                kept.push(fragment.clone());
            } else {
                filtered_count += 1;
                info!("filtered: '{}'", fragment.text());
            }
        }
        Ok(FilterOutcome {
            kept,
            filtered_count,
        })
    }
}

pub fn render_prompt(texts: &[&str]) -> Result<String> {
    let numbered = texts
        .iter()
        .enumerate()
        .map(|(idx, text)| format!("[{}] {}", idx, text.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    let mut context = TeraContext::new();
    context.insert("numbered", &numbered);
    let rendered = Tera::one_off(PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render noise filter prompt")?;
    Ok(rendered.trim().to_string())
}

fn parse_keep_indices(response: &str, total: usize) -> Result<KeepSet, StageError> {
    let cleaned = response
        .trim()
        .trim_matches(|ch: char| matches!(ch, '`' | '"' | '\'' | '[' | ']' | '.' | '。'))
        .trim()
        .to_lowercase();
    match cleaned.as_str() {
        "all" => return Ok(KeepSet::All),
        "none" => return Ok(KeepSet::Nothing),
        _ => {}
    }

    let indices: BTreeSet<usize> = cleaned
        .split([',', '，', ' ', '\n'])
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|idx| *idx < total)
        .collect();
    if indices.is_empty() {
        return Err(StageError::Unparseable(response.to_string()));
    }
    Ok(KeepSet::Indices(indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBoxPx;
    use crate::providers::ProviderFuture;
    use anyhow::anyhow;

    struct Reply(&'static str);

    impl Provider for Reply {
        fn name(&self) -> &str {
            "reply"
        }

        fn complete<'a>(&'a self, _prompt: String) -> ProviderFuture<'a> {
            let reply = self.0.to_string();
            Box::pin(async move { Ok(reply) })
        }
    }

    struct Broken;

    impl Provider for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn complete<'a>(&'a self, _prompt: String) -> ProviderFuture<'a> {
            Box::pin(async { Err(anyhow!("connection reset")) })
        }
    }

    fn fragments(texts: &[&str]) -> Vec<TextFragment> {
        texts
            .iter()
            .enumerate()
            .map(|(idx, text)| TextFragment::new(*text, BBoxPx::new(0, idx as u32 * 20, 100, 18), 0.9))
            .collect()
    }

    #[tokio::test]
    async fn keeps_only_listed_indices() {
        let filter = NoiseFilter::new(Arc::new(Reply("1")));
        let input = fragments(&["第3页", "人工智能的未来", "●"]);
        let outcome = filter.filter(&input).await.unwrap();
        let kept: Vec<_> = outcome.kept.iter().map(TextFragment::text).collect();
        assert_eq!(kept, vec!["人工智能的未来"]);
        assert_eq!(outcome.filtered_count, 2);
    }

    #[tokio::test]
    async fn all_and_none_literals() {
        let input = fragments(&["标题", "正文内容"]);
        let all = NoiseFilter::new(Arc::new(Reply("ALL")))
            .filter(&input)
            .await
            .unwrap();
        assert_eq!(all.kept.len(), 2);
        let none = NoiseFilter::new(Arc::new(Reply("none")))
            .filter(&input)
            .await
            .unwrap();
        assert!(none.kept.is_empty());
        assert_eq!(none.filtered_count, 2);
    }

    #[tokio::test]
    async fn provider_failure_is_an_error_the_caller_degrades() {
        let input = fragments(&["标题", "正文内容"]);
        let result = NoiseFilter::new(Arc::new(Broken)).filter(&input).await;
        let outcome = crate::error::degrade_to_identity("noise filter", 1, result, || {
            FilterOutcome::keep_all(input.clone())
        });
        assert_eq!(outcome.kept, input);
        assert_eq!(outcome.filtered_count, 0);
    }

    #[test]
    fn parse_tolerates_spacing_and_rejects_garbage() {
        assert_eq!(
            parse_keep_indices(" 0, 2 ,7 ", 3).unwrap(),
            KeepSet::Indices([0, 2].into_iter().collect())
        );
        assert_eq!(
            parse_keep_indices("[0，1]", 3).unwrap(),
            KeepSet::Indices([0, 1].into_iter().collect())
        );
        assert!(parse_keep_indices("I think all of them are fine", 3).is_err());
        assert!(parse_keep_indices("", 3).is_err());
        assert!(parse_keep_indices("9", 3).is_err());
    }

    #[test]
    fn prompt_numbers_every_fragment() {
        let prompt = render_prompt(&["第3页", "人工智能的未来"]).unwrap();
        assert!(prompt.contains("[0] 第3页\n[1] 人工智能的未来"));
    }
}

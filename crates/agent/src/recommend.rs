use std::collections::BTreeSet;

use chatflow_core::domain::product::Product;
use chatflow_core::ports::Recommender;

/// Matches a free-text preference against catalog text by character-bigram
/// overlap, breaking ties on popularity. With no overlap at all the most
/// popular product is suggested.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreferenceRecommender;

impl Recommender for PreferenceRecommender {
    fn recommend(&self, preference: &str, products: &[Product]) -> Option<Product> {
        let wanted = bigrams(preference);
        let mut best: Option<(usize, &Product)> = None;
        for product in products {
            let score = overlap(&wanted, &bigrams(&product.searchable_text()));
            let better = best.map_or(true, |(top, current)| {
                (score, product.popularity) > (top, current.popularity)
            });
            if better {
                best = Some((score, product));
            }
        }

        if let Some((score, product)) = best {
            tracing::debug!(
                event_name = "recommend.scored",
                product = %product.name,
                score,
                "recommendation selected"
            );
        }
        best.map(|(_, product)| product.clone())
    }
}

fn bigrams(text: &str) -> BTreeSet<String> {
    let chars = text
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .collect::<Vec<_>>();
    chars.windows(2).map(|pair| pair.iter().collect()).collect()
}

fn overlap(wanted: &BTreeSet<String>, offered: &BTreeSet<String>) -> usize {
    wanted.intersection(offered).count()
}

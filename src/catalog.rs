//! Listing filters and orderings for the marketplace, ranking and agency
//! directory.

use crate::models::{Agency, Agent, PriceType};
use crate::ratings::{aggregate_ratings, mean_rating, AggregateRating};
use serde::{Deserialize, Serialize};

/// An agent category with its pt-BR label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
}

pub static CATEGORIES: [Category; 8] = [
    Category { id: "automation", name: "Automação", icon: "🤖" },
    Category { id: "chatbots", name: "Chatbots", icon: "💬" },
    Category { id: "data_analysis", name: "Análise de Dados", icon: "📊" },
    Category { id: "content_creation", name: "Criação de Conteúdo", icon: "✍️" },
    Category { id: "research", name: "Pesquisa", icon: "🔍" },
    Category { id: "productivity", name: "Produtividade", icon: "⚡" },
    Category { id: "dev_tools", name: "Ferramentas para Devs", icon: "🛠️" },
    Category { id: "machine_learning", name: "Machine Learning", icon: "🧠" },
];

/// Agency specialty labels, stored verbatim on agencies.
pub const SPECIALTIES: [&str; 13] = [
    "Assistentes Virtuais",
    "Atendimento ao Cliente",
    "Automação de Tarefas",
    "Criação de Conteúdo",
    "Análise de Dados",
    "Tradução e Idiomas",
    "Edição de Imagens",
    "Transcrição de Áudio",
    "Pesquisa e Relatórios",
    "Suporte Empresarial",
    "Marketing Digital",
    "Educação e Treinamento",
    "Outros",
];

pub fn category(id: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.id == id)
}

/// Splits a comma-separated query value, dropping blanks.
pub fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// An agent together with its aggregate rating, as shown in every listing.
#[derive(Debug, Clone, Serialize)]
pub struct AgentCard {
    #[serde(flatten)]
    pub agent: Agent,
    pub rating: AggregateRating,
    /// Unrounded mean, used for ordering only.
    #[serde(skip)]
    pub mean: Option<f64>,
}

impl AgentCard {
    /// Builds a card from an agent fetched with embedded `reviews(rating)`.
    pub fn from_agent(agent: Agent) -> Self {
        let rating = aggregate_ratings(&agent.reviews);
        let mean = mean_rating(&agent.reviews);
        Self { agent, rating, mean }
    }
}

// ============ Marketplace ============

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketplaceQuery {
    pub search: Option<String>,
    /// Comma-separated category ids.
    pub category: Option<String>,
    /// Comma-separated price types.
    pub price_type: Option<String>,
    pub min_rating: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentFilter {
    pub search: String,
    pub categories: Vec<String>,
    pub price_types: Vec<PriceType>,
    pub min_rating: Option<f64>,
}

impl From<&MarketplaceQuery> for AgentFilter {
    fn from(q: &MarketplaceQuery) -> Self {
        Self {
            search: q.search.clone().unwrap_or_default(),
            categories: split_csv(q.category.as_deref()),
            price_types: split_csv(q.price_type.as_deref())
                .iter()
                .filter_map(|p| PriceType::from_id(p))
                .collect(),
            min_rating: q.min_rating,
        }
    }
}

impl AgentFilter {
    pub fn matches(&self, card: &AgentCard) -> bool {
        self.matches_search(&card.agent)
            && (self.categories.is_empty() || self.categories.contains(&card.agent.category))
            && (self.price_types.is_empty() || self.price_types.contains(&card.agent.price_type))
            && self.matches_rating(&card.rating)
    }

    fn matches_search(&self, agent: &Agent) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        agent.name.to_lowercase().contains(&needle)
            || agent.description.to_lowercase().contains(&needle)
            || agent.category.to_lowercase().contains(&needle)
            || category(&agent.category)
                .map(|c| c.name.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }

    fn matches_rating(&self, rating: &AggregateRating) -> bool {
        match (self.min_rating, rating.average) {
            (None, _) => true,
            (Some(min), Some(avg)) => avg >= min,
            (Some(_), None) => false,
        }
    }

    /// Whether any category, price or rating filter is set. Search text
    /// does not count.
    pub fn has_active_filters(&self) -> bool {
        !self.categories.is_empty() || !self.price_types.is_empty() || self.min_rating.is_some()
    }

    pub fn apply(&self, cards: Vec<AgentCard>) -> Vec<AgentCard> {
        cards.into_iter().filter(|c| self.matches(c)).collect()
    }
}

// ============ Ranking ============

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingQuery {
    /// Comma-separated category ids.
    pub category: Option<String>,
}

/// Orders cards best-first: higher unrounded mean first (unrated counts as
/// 0), equal means broken by review count. The sort is stable.
pub fn rank_agents(cards: &mut [AgentCard]) {
    cards.sort_by(|a, b| {
        let a_avg = a.mean.unwrap_or(0.0);
        let b_avg = b.mean.unwrap_or(0.0);
        b_avg
            .total_cmp(&a_avg)
            .then_with(|| b.rating.count.cmp(&a.rating.count))
    });
}

/// Keeps cards whose lower-cased category is among `categories`; an empty
/// list keeps everything.
pub fn filter_ranking(cards: Vec<AgentCard>, categories: &[String]) -> Vec<AgentCard> {
    if categories.is_empty() {
        return cards;
    }
    cards
        .into_iter()
        .filter(|c| categories.contains(&c.agent.category.to_lowercase()))
        .collect()
}

// ============ Agencies ============

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgencyQuery {
    pub search: Option<String>,
    /// Comma-separated specialty labels.
    pub specialty: Option<String>,
    pub min_clients: Option<i64>,
    #[serde(default)]
    pub verified_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgencyFilter {
    pub search: String,
    pub specialties: Vec<String>,
    pub min_clients: Option<i64>,
    pub verified_only: bool,
}

impl From<&AgencyQuery> for AgencyFilter {
    fn from(q: &AgencyQuery) -> Self {
        Self {
            search: q.search.clone().unwrap_or_default(),
            specialties: split_csv(q.specialty.as_deref()),
            min_clients: q.min_clients,
            verified_only: q.verified_only,
        }
    }
}

impl AgencyFilter {
    pub fn matches(&self, agency: &Agency) -> bool {
        let needle = self.search.trim().to_lowercase();
        let matches_search = needle.is_empty()
            || agency.name.to_lowercase().contains(&needle)
            || agency.description.to_lowercase().contains(&needle)
            || agency.location.to_lowercase().contains(&needle)
            || agency
                .specialties
                .iter()
                .any(|s| s.to_lowercase().contains(&needle));

        let matches_specialties = self.specialties.is_empty()
            || self.specialties.iter().any(|s| agency.specialties.contains(s));

        let matches_clients = self
            .min_clients
            .map(|min| agency.total_clients >= min)
            .unwrap_or(true);

        let matches_verified = !self.verified_only || agency.is_verified();

        matches_search && matches_specialties && matches_clients && matches_verified
    }

    /// Number of active non-search filters, shown as a badge.
    pub fn active_filter_count(&self) -> usize {
        self.specialties.len()
            + usize::from(self.min_clients.is_some())
            + usize::from(self.verified_only)
    }

    pub fn apply(&self, agencies: Vec<Agency>) -> Vec<Agency> {
        agencies.into_iter().filter(|a| self.matches(a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerificationStatus;
    use crate::ratings::RatingRecord;
    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;

    fn agent(name: &str, category: &str, price: PriceType, scores: &[i64]) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{} description", name),
            image_url: None,
            cover_url: None,
            website_url: "https://example.com".to_string(),
            price_type: price,
            starting_price: None,
            category: category.to_string(),
            is_premium: false,
            verification_status: VerificationStatus::Approved,
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
            profiles: None,
            reviews: scores.iter().map(|s| RatingRecord::new(*s as f64)).collect(),
            extra: Map::new(),
        }
    }

    fn card(name: &str, category: &str, price: PriceType, scores: &[i64]) -> AgentCard {
        AgentCard::from_agent(agent(name, category, price, scores))
    }

    fn agency(name: &str, clients: i64, specialties: &[&str], status: VerificationStatus) -> Agency {
        Agency {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: "Agência de automação".to_string(),
            logo_url: None,
            cover_url: None,
            website_url: "https://example.com".to_string(),
            location: "São Paulo, SP".to_string(),
            specialties: specialties.iter().map(|s| s.to_string()).collect(),
            cnpj: "11222333000181".to_string(),
            total_clients: clients,
            user_id: Uuid::new_v4(),
            verification_status: status,
            created_at: Utc::now(),
            profiles: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_card_uses_aggregate() {
        let c = card("A", "chatbots", PriceType::Free, &[5, 4]);
        assert_eq!(c.rating.average, Some(4.5));
        assert_eq!(c.rating.count, 2);
    }

    #[test]
    fn test_search_matches_category_label() {
        let filter = AgentFilter {
            search: "análise".to_string(),
            ..Default::default()
        };
        assert!(filter.matches(&card("Planilhas", "data_analysis", PriceType::Free, &[])));
        assert!(!filter.matches(&card("Bot", "chatbots", PriceType::Free, &[])));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = AgentFilter {
            search: "ATENDE".to_string(),
            ..Default::default()
        };
        assert!(filter.matches(&card("Atendente Virtual", "chatbots", PriceType::Paid, &[])));
    }

    #[test]
    fn test_category_and_price_filters() {
        let filter = AgentFilter {
            categories: vec!["chatbots".to_string()],
            price_types: vec![PriceType::Free, PriceType::Freemium],
            ..Default::default()
        };
        assert!(filter.matches(&card("A", "chatbots", PriceType::Free, &[])));
        assert!(!filter.matches(&card("B", "chatbots", PriceType::Paid, &[])));
        assert!(!filter.matches(&card("C", "research", PriceType::Free, &[])));
        assert!(filter.has_active_filters());
    }

    #[test]
    fn test_min_rating_excludes_unrated() {
        let filter = AgentFilter {
            min_rating: Some(4.0),
            ..Default::default()
        };
        assert!(filter.matches(&card("A", "chatbots", PriceType::Free, &[4])));
        assert!(!filter.matches(&card("B", "chatbots", PriceType::Free, &[3, 4])));
        assert!(!filter.matches(&card("C", "chatbots", PriceType::Free, &[])));
    }

    #[test]
    fn test_search_alone_is_not_an_active_filter() {
        let filter = AgentFilter {
            search: "bot".to_string(),
            ..Default::default()
        };
        assert!(!filter.has_active_filters());
    }

    #[test]
    fn test_query_parsing() {
        let q = MarketplaceQuery {
            search: None,
            category: Some("chatbots, research,,".to_string()),
            price_type: Some("free,unknown".to_string()),
            min_rating: Some(4.5),
        };
        let f = AgentFilter::from(&q);
        assert_eq!(f.categories, vec!["chatbots", "research"]);
        assert_eq!(f.price_types, vec![PriceType::Free]);
        assert_eq!(f.min_rating, Some(4.5));
    }

    #[test]
    fn test_rank_by_average_then_count() {
        let mut cards = vec![
            card("unrated", "chatbots", PriceType::Free, &[]),
            card("four-one", "chatbots", PriceType::Free, &[4]),
            card("five", "chatbots", PriceType::Free, &[5]),
            card("four-three", "chatbots", PriceType::Free, &[4, 4, 4]),
        ];
        rank_agents(&mut cards);
        let names: Vec<&str> = cards.iter().map(|c| c.agent.name.as_str()).collect();
        assert_eq!(names, vec!["five", "four-three", "four-one", "unrated"]);
    }

    #[test]
    fn test_rank_uses_unrounded_mean() {
        // 24 fives and one four: mean 4.96, displayed as 5.0
        let mut scores = vec![5; 24];
        scores.push(4);
        let mut cards = vec![
            card("many", "chatbots", PriceType::Free, &scores),
            card("single", "chatbots", PriceType::Free, &[5]),
        ];
        assert_eq!(cards[0].rating.average, Some(5.0));

        rank_agents(&mut cards);
        assert_eq!(cards[0].agent.name, "single");
        assert_eq!(cards[1].agent.name, "many");
    }

    #[test]
    fn test_ranking_category_filter_lowercases() {
        let cards = vec![
            card("A", "Chatbots", PriceType::Free, &[]),
            card("B", "research", PriceType::Free, &[]),
        ];
        let kept = filter_ranking(cards, &["chatbots".to_string()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].agent.name, "A");
    }

    #[test]
    fn test_agency_filters() {
        let agencies = vec![
            agency("Alfa", 120, &["Marketing Digital"], VerificationStatus::Approved),
            agency("Beta", 30, &["Análise de Dados"], VerificationStatus::Approved),
            agency("Gama", 200, &["Marketing Digital"], VerificationStatus::Pending),
        ];

        let filter = AgencyFilter {
            specialties: vec!["Marketing Digital".to_string()],
            min_clients: Some(100),
            verified_only: true,
            ..Default::default()
        };
        let kept = filter.apply(agencies.clone());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Alfa");
        assert_eq!(filter.active_filter_count(), 3);

        let search = AgencyFilter {
            search: "paulo".to_string(),
            ..Default::default()
        };
        assert_eq!(search.apply(agencies.clone()).len(), 3);

        let by_specialty_text = AgencyFilter {
            search: "dados".to_string(),
            ..Default::default()
        };
        assert_eq!(by_specialty_text.apply(agencies)[0].name, "Beta");
    }

    #[test]
    fn test_split_csv() {
        assert!(split_csv(None).is_empty());
        assert_eq!(split_csv(Some(" a ,b")), vec!["a", "b"]);
    }
}

//! Page metadata (title, description, canonical URL) and schema.org
//! structured data for the public pages.

use crate::display::format_price;
use crate::models::{Agency, Agent, PriceType};
use crate::ratings::AggregateRating;
use serde::Serialize;
use serde_json::{json, Value};

pub const SITE_NAME: &str = "AgentDex";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
    pub image: Option<String>,
    pub structured_data: Value,
}

/// Builds metadata relative to the public site URL.
#[derive(Debug, Clone)]
pub struct Seo {
    site_url: String,
}

impl Seo {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    fn default_image(&self, name: &str) -> String {
        format!("{}/{}", self.site_url, name)
    }

    pub fn agent(&self, agent: &Agent, rating: &AggregateRating) -> PageMetadata {
        let price_text = match (agent.price_type, agent.starting_price) {
            (PriceType::Free, _) => "Gratuito".to_string(),
            (_, Some(price)) => format!("A partir de {}", format_price(Some(price))),
            (PriceType::Paid, None) => "Pago".to_string(),
            (PriceType::Freemium, None) => "Freemium".to_string(),
        };
        let url = format!("{}/agents/{}", self.site_url, agent.id);
        let image = agent
            .image_url
            .clone()
            .unwrap_or_else(|| self.default_image("default-agent.jpg"));

        let mut structured = json!({
            "@context": "https://schema.org",
            "@type": "Product",
            "name": agent.name,
            "description": agent.description,
            "image": image,
            "offers": {
                "@type": "Offer",
                "price": agent.starting_price.unwrap_or(0.0),
                "priceCurrency": "BRL",
                "availability": "https://schema.org/InStock",
            },
        });
        if let Some(avg) = rating.average.filter(|a| *a > 0.0) {
            structured["aggregateRating"] = json!({
                "@type": "AggregateRating",
                "ratingValue": avg,
                "reviewCount": rating.count,
            });
        }

        PageMetadata {
            title: format!("{} - {} | {}", agent.name, price_text, SITE_NAME),
            description: agent.description.clone(),
            kind: "product",
            url,
            image: Some(image),
            structured_data: structured,
        }
    }

    pub fn agency(&self, agency: &Agency) -> PageMetadata {
        let badge = if agency.is_verified() { " ✓" } else { "" };
        let logo = agency
            .logo_url
            .clone()
            .unwrap_or_else(|| self.default_image("default-agency.jpg"));

        PageMetadata {
            title: format!("{} - Agência de IA{} | {}", agency.name, badge, SITE_NAME),
            description: agency.description.clone(),
            kind: "organization",
            url: format!("{}/agencies/{}", self.site_url, agency.id),
            image: Some(logo.clone()),
            structured_data: json!({
                "@context": "https://schema.org",
                "@type": "Organization",
                "name": agency.name,
                "description": agency.description,
                "logo": logo,
                "url": agency.website_url,
                "address": {
                    "@type": "PostalAddress",
                    "addressLocality": agency.location,
                    "addressCountry": "BR",
                },
                "numberOfEmployees": {
                    "@type": "QuantitativeValue",
                    "value": agency.total_clients,
                },
            }),
        }
    }

    fn collection(&self, path: &str, title: &str, name: &str, description: String, summary: String) -> PageMetadata {
        let url = format!("{}/{}", self.site_url, path);
        PageMetadata {
            title: format!("{} | {}", title, SITE_NAME),
            description,
            kind: "website",
            url: url.clone(),
            image: None,
            structured_data: json!({
                "@context": "https://schema.org",
                "@type": "CollectionPage",
                "name": name,
                "description": summary,
                "url": url,
            }),
        }
    }

    pub fn marketplace(&self, total_agents: usize) -> PageMetadata {
        self.collection(
            "marketplace",
            "Marketplace de Agentes de IA",
            "Marketplace de Agentes de IA",
            format!(
                "Explore {}+ agentes de IA para automatizar seus processos. Compare preços, avaliações e funcionalidades para encontrar a solução perfeita.",
                total_agents
            ),
            format!("Diretório com {}+ agentes de IA", total_agents),
        )
    }

    pub fn agencies(&self, total_agencies: usize) -> PageMetadata {
        self.collection(
            "agencies",
            "Agências Especializadas em IA",
            "Agências Especializadas em IA",
            format!(
                "Encontre as melhores agências de IA do Brasil. {}+ agências verificadas prontas para transformar seu negócio com inteligência artificial.",
                total_agencies
            ),
            format!("Diretório com {}+ agências de IA", total_agencies),
        )
    }

    pub fn ranking(&self) -> PageMetadata {
        self.collection(
            "ranking",
            "Ranking dos Melhores Agentes de IA",
            "Ranking de Agentes de IA",
            "Descubra os agentes de IA mais bem avaliados do Brasil. Ranking atualizado com base em avaliações reais de usuários.".to_string(),
            "Os agentes de IA mais bem avaliados".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerificationStatus;
    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;

    fn agent(price_type: PriceType, starting_price: Option<f64>) -> Agent {
        Agent {
            id: Uuid::nil(),
            name: "Resumidor".to_string(),
            description: "Resume reuniões".to_string(),
            image_url: None,
            cover_url: None,
            website_url: "https://example.com".to_string(),
            price_type,
            starting_price,
            category: "productivity".to_string(),
            is_premium: false,
            verification_status: VerificationStatus::Approved,
            user_id: Uuid::nil(),
            created_at: Utc::now(),
            profiles: None,
            reviews: Vec::new(),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_agent_titles() {
        let seo = Seo::new("https://agentdex.com.br/");
        let unrated = AggregateRating::default();

        let meta = seo.agent(&agent(PriceType::Free, None), &unrated);
        assert_eq!(meta.title, "Resumidor - Gratuito | AgentDex");
        assert_eq!(meta.url, format!("https://agentdex.com.br/agents/{}", Uuid::nil()));
        assert_eq!(meta.image.as_deref(), Some("https://agentdex.com.br/default-agent.jpg"));

        let meta = seo.agent(&agent(PriceType::Paid, Some(49.9)), &unrated);
        assert_eq!(meta.title, "Resumidor - A partir de R$ 49,90 | AgentDex");

        let meta = seo.agent(&agent(PriceType::Freemium, None), &unrated);
        assert_eq!(meta.title, "Resumidor - Freemium | AgentDex");
    }

    #[test]
    fn test_aggregate_rating_only_when_rated() {
        let seo = Seo::new("https://agentdex.com.br");
        let a = agent(PriceType::Free, None);

        let meta = seo.agent(&a, &AggregateRating::default());
        assert!(meta.structured_data.get("aggregateRating").is_none());

        let rated = AggregateRating { average: Some(4.5), count: 2 };
        let meta = seo.agent(&a, &rated);
        assert_eq!(meta.structured_data["aggregateRating"]["ratingValue"], json!(4.5));
        assert_eq!(meta.structured_data["aggregateRating"]["reviewCount"], json!(2));
    }

    #[test]
    fn test_collection_pages() {
        let seo = Seo::new("https://agentdex.com.br");
        let meta = seo.marketplace(42);
        assert!(meta.description.contains("42+"));
        assert_eq!(meta.structured_data["@type"], json!("CollectionPage"));
        assert_eq!(seo.ranking().url, "https://agentdex.com.br/ranking");
        assert_eq!(seo.agencies(7).title, "Agências Especializadas em IA | AgentDex");
    }
}

//! Submit, edit and delete workflows for agents, agencies and reviews.
//!
//! Every listing enters the directory as `pending`; edits and deletions are
//! filtered by owner so a caller can only touch their own rows.

use crate::catalog::{category, SPECIALTIES};
use crate::cnpj::{normalize, validate_company_id};
use crate::directory::{DirectoryService, ListingKind, ReviewTarget};
use crate::errors::AppError;
use crate::models::*;
use crate::session::Actor;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

fn required(value: &str, label: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} é obrigatório", label)));
    }
    Ok(value.to_string())
}

fn website(value: &str) -> Result<String, AppError> {
    let value = required(value, "Website")?;
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(value),
        _ => Err(AppError::BadRequest("Website inválido".to_string())),
    }
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parses a BRL amount typed as a number or as text with a decimal comma.
/// Free agents never carry a price.
pub fn parse_starting_price(price_type: PriceType, raw: Option<&Value>) -> Result<Option<f64>, AppError> {
    if price_type == PriceType::Free {
        return Ok(None);
    }

    let price = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok(),
        Some(_) => None,
    };

    match price {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(Some(p)),
        _ => Err(AppError::BadRequest("Preço inicial inválido".to_string())),
    }
}

/// Checks an agent form and returns the sanitized column values.
pub fn validate_agent_form(form: &AgentForm) -> Result<AgentChanges, AppError> {
    let name = required(&form.name, "Nome")?;
    let description = required(&form.description, "Descrição")?;
    let website_url = website(&form.website_url)?;

    let category = category(form.category.trim())
        .ok_or_else(|| AppError::BadRequest("Categoria inválida".to_string()))?
        .id
        .to_string();
    let price_type = PriceType::from_id(&form.price_type)
        .ok_or_else(|| AppError::BadRequest("Tipo de preço inválido".to_string()))?;
    let starting_price = parse_starting_price(price_type, form.starting_price.as_ref())?;

    Ok(AgentChanges {
        name,
        description,
        image_url: optional_text(&form.image_url),
        cover_url: optional_text(&form.cover_url),
        website_url,
        price_type,
        starting_price,
        category,
    })
}

/// Checks an agency form and returns the CNPJ normalized to 14 digits with
/// the sanitized editable columns.
pub fn validate_agency_form(form: &AgencyForm) -> Result<(String, AgencyChanges), AppError> {
    if !validate_company_id(&form.cnpj) {
        tracing::warn!("Rejected agency form with invalid CNPJ");
        return Err(AppError::BadRequest("CNPJ inválido".to_string()));
    }

    let name = required(&form.name, "Nome")?;
    let description = required(&form.description, "Descrição")?;
    let website_url = website(&form.website_url)?;
    let location = required(&form.location, "Localização")?;

    let mut specialties = Vec::with_capacity(form.specialties.len());
    for specialty in &form.specialties {
        let specialty = specialty.trim();
        if !SPECIALTIES.contains(&specialty) {
            return Err(AppError::BadRequest(format!("Especialidade desconhecida: {}", specialty)));
        }
        if !specialties.iter().any(|s| s == specialty) {
            specialties.push(specialty.to_string());
        }
    }

    let changes = AgencyChanges {
        name,
        description,
        logo_url: optional_text(&form.logo_url),
        cover_url: optional_text(&form.cover_url),
        website_url,
        location,
        specialties,
    };
    Ok((normalize(&form.cnpj), changes))
}

/// Checks a review form; returns the rating and the trimmed comment.
pub fn validate_review_form(form: &ReviewForm) -> Result<(i64, String), AppError> {
    if !(MIN_RATING..=MAX_RATING).contains(&form.rating) {
        return Err(AppError::BadRequest(format!(
            "A avaliação deve ser entre {} e {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok((form.rating, form.comment.trim().to_string()))
}

fn duplicate_cnpj() -> AppError {
    AppError::Conflict("Já existe uma agência cadastrada com este CNPJ".to_string())
}

fn not_owned() -> AppError {
    AppError::NotFound("Registro não encontrado ou sem permissão".to_string())
}

// ============ Agents ============

pub async fn submit_agent(
    directory: &DirectoryService,
    actor: &Actor,
    form: &AgentForm,
) -> Result<Agent, AppError> {
    let fields = validate_agent_form(form)?;
    let agent = NewAgent {
        name: fields.name,
        description: fields.description,
        image_url: fields.image_url,
        cover_url: fields.cover_url,
        website_url: fields.website_url,
        price_type: fields.price_type,
        starting_price: fields.starting_price,
        category: fields.category,
        user_id: actor.id,
        verification_status: VerificationStatus::Pending,
    };

    let created = directory.insert_agent(&agent, &actor.access_token).await?;
    tracing::info!("Agent {} submitted by {}", created.id, actor.id);
    Ok(created)
}

pub async fn update_agent(
    directory: &DirectoryService,
    actor: &Actor,
    id: Uuid,
    form: &AgentForm,
) -> Result<(), AppError> {
    let changes = validate_agent_form(form)?;
    if !directory
        .update_owned(ListingKind::Agent, id, actor.id, &changes, &actor.access_token)
        .await?
    {
        return Err(not_owned());
    }
    tracing::info!("Agent {} updated by {}", id, actor.id);
    Ok(())
}

// ============ Agencies ============

pub async fn submit_agency(
    directory: &DirectoryService,
    actor: &Actor,
    form: &AgencyForm,
) -> Result<Agency, AppError> {
    let (cnpj, fields) = validate_agency_form(form)?;

    if directory.agency_id_by_cnpj(&cnpj).await?.is_some() {
        tracing::warn!("Duplicate agency CNPJ submitted by {}", actor.id);
        return Err(duplicate_cnpj());
    }

    let agency = NewAgency {
        name: fields.name,
        cnpj,
        description: fields.description,
        logo_url: fields.logo_url,
        cover_url: fields.cover_url,
        website_url: fields.website_url,
        location: fields.location,
        specialties: fields.specialties,
        user_id: actor.id,
        verification_status: VerificationStatus::Pending,
    };

    let created = directory.insert_agency(&agency, &actor.access_token).await?;
    tracing::info!("Agency {} submitted by {}", created.id, actor.id);
    Ok(created)
}

/// Edits an agency owned by the actor. The CNPJ cannot change; a form
/// carrying a different one is rejected.
pub async fn update_agency(
    directory: &DirectoryService,
    actor: &Actor,
    id: Uuid,
    form: &AgencyForm,
) -> Result<(), AppError> {
    let (cnpj, changes) = validate_agency_form(form)?;

    let existing = directory
        .agency(id, Some(&actor.access_token))
        .await?
        .filter(|a| a.user_id == actor.id)
        .ok_or_else(not_owned)?;
    if normalize(&existing.cnpj) != cnpj {
        tracing::warn!("Agency {} edit tried to change its CNPJ", id);
        return Err(AppError::BadRequest("O CNPJ não pode ser alterado".to_string()));
    }

    if !directory
        .update_owned(ListingKind::Agency, id, actor.id, &changes, &actor.access_token)
        .await?
    {
        return Err(not_owned());
    }
    tracing::info!("Agency {} updated by {}", id, actor.id);
    Ok(())
}

/// Deletes an agent or agency owned by the actor.
pub async fn delete_listing(
    directory: &DirectoryService,
    actor: &Actor,
    kind: ListingKind,
    id: Uuid,
) -> Result<(), AppError> {
    if !directory
        .delete_owned(kind, id, actor.id, &actor.access_token)
        .await?
    {
        return Err(not_owned());
    }
    tracing::info!("{} {} deleted by {}", kind.table(), id, actor.id);
    Ok(())
}

// ============ Reviews ============

pub async fn submit_review(
    directory: &DirectoryService,
    actor: &Actor,
    target: ReviewTarget,
    form: &ReviewForm,
) -> Result<Review, AppError> {
    let (rating, comment) = validate_review_form(form)?;
    let (agent_id, agency_id) = match target {
        ReviewTarget::Agent(id) => (Some(id), None),
        ReviewTarget::Agency(id) => (None, Some(id)),
    };
    let review = NewReview {
        agent_id,
        agency_id,
        user_id: actor.id,
        rating,
        comment,
    };

    let created = directory
        .insert_review(target, &review, &actor.access_token)
        .await?;
    tracing::info!("Review {} stored in {}", created.id, target.table());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent_form() -> AgentForm {
        AgentForm {
            name: " Atendente IA ".to_string(),
            description: "Responde clientes".to_string(),
            website_url: "https://example.com".to_string(),
            category: "chatbots".to_string(),
            price_type: "paid".to_string(),
            starting_price: Some(json!("49,90")),
            image_url: Some("".to_string()),
            cover_url: None,
        }
    }

    fn agency_form(cnpj: &str) -> AgencyForm {
        AgencyForm {
            name: "Agência Alfa".to_string(),
            cnpj: cnpj.to_string(),
            description: "Automação com IA".to_string(),
            website_url: "https://alfa.com.br".to_string(),
            location: "São Paulo, SP".to_string(),
            specialties: vec![
                "Marketing Digital".to_string(),
                "Marketing Digital".to_string(),
            ],
            logo_url: None,
            cover_url: None,
        }
    }

    #[test]
    fn test_parse_starting_price() {
        assert_eq!(parse_starting_price(PriceType::Paid, Some(&json!("49,90"))).unwrap(), Some(49.9));
        assert_eq!(parse_starting_price(PriceType::Paid, Some(&json!(10))).unwrap(), Some(10.0));
        assert_eq!(parse_starting_price(PriceType::Freemium, Some(&json!(""))).unwrap(), None);
        assert_eq!(parse_starting_price(PriceType::Free, Some(&json!("99"))).unwrap(), None);
        assert!(parse_starting_price(PriceType::Paid, Some(&json!("abc"))).is_err());
        assert!(parse_starting_price(PriceType::Paid, Some(&json!(-1))).is_err());
    }

    #[test]
    fn test_validate_agent_form() {
        let fields = validate_agent_form(&agent_form()).unwrap();
        assert_eq!(fields.name, "Atendente IA");
        assert_eq!(fields.starting_price, Some(49.9));
        assert_eq!(fields.image_url, None);

        let mut form = agent_form();
        form.category = "crypto".to_string();
        assert!(validate_agent_form(&form).is_err());

        let mut form = agent_form();
        form.website_url = "ftp://example.com".to_string();
        assert!(validate_agent_form(&form).is_err());

        let mut form = agent_form();
        form.price_type = "free".to_string();
        assert_eq!(validate_agent_form(&form).unwrap().starting_price, None);
    }

    #[test]
    fn test_validate_agency_form() {
        let (cnpj, fields) = validate_agency_form(&agency_form("11.222.333/0001-81")).unwrap();
        assert_eq!(cnpj, "11222333000181");
        assert_eq!(fields.specialties, vec!["Marketing Digital"]);

        let err = validate_agency_form(&agency_form("11.222.333/0001-82")).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: CNPJ inválido");

        let mut form = agency_form("11222333000181");
        form.specialties = vec!["Astrologia".to_string()];
        assert!(validate_agency_form(&form).is_err());

        let mut form = agency_form("11222333000181");
        form.location = "   ".to_string();
        assert!(validate_agency_form(&form).is_err());
    }

    #[test]
    fn test_validate_review_form() {
        let form = ReviewForm { rating: 5, comment: "  Ótimo  ".to_string() };
        assert_eq!(validate_review_form(&form).unwrap(), (5, "Ótimo".to_string()));
        assert!(validate_review_form(&ReviewForm { rating: 0, comment: String::new() }).is_err());
        assert!(validate_review_form(&ReviewForm { rating: 6, comment: String::new() }).is_err());
    }
}

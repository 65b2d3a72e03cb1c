use chrono::Utc;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::marketplace::normalize_hash;
use crate::models::{NewSite, Site};
use crate::store::{AccountStore, StoreError};
use crate::users;

pub const MAX_SLUG_LEN: usize = 63;

/// Slugs become DNS labels, so they follow the label rules.
pub fn validate_slug(raw: &str) -> ServiceResult<String> {
    let slug = raw.trim();
    let valid = (1..=MAX_SLUG_LEN).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if valid {
        Ok(slug.to_string())
    } else {
        Err(ServiceError::Invalid(format!("Invalid slug: {}", raw)))
    }
}

pub fn create_site(store: &dyn AccountStore, clerk_id: &str, request: NewSite) -> ServiceResult<Site> {
    let slug = validate_slug(&request.slug)?;
    let manifest_tx = request
        .manifest_tx
        .as_deref()
        .map(|tx| normalize_hash(tx, "manifest transaction"))
        .transpose()?;
    let inscription_tx = request
        .inscription_tx
        .as_deref()
        .map(|tx| normalize_hash(tx, "inscription transaction"))
        .transpose()?;

    // sites.user_id references users, so the owner must exist first.
    users::profile(store, clerk_id)?;
    if store.site_by_slug(&slug)?.is_some() {
        return Err(ServiceError::Invalid(format!("Slug {} is already taken", slug)));
    }

    let site = Site {
        id: Uuid::new_v4(),
        user_id: clerk_id.to_string(),
        slug,
        status: if inscription_tx.is_some() { "inscribed" } else { "pending" }.to_string(),
        manifest_tx,
        inscription_tx,
        created_at: Utc::now(),
    };
    match store.insert_site(&site) {
        Ok(()) => {
            log::info!("Site {} created for {}", site.slug, clerk_id);
            Ok(site)
        }
        Err(StoreError::Conflict(_)) => Err(ServiceError::Invalid(format!("Slug {} is already taken", site.slug))),
        Err(e) => Err(e.into()),
    }
}

pub fn list_sites(store: &dyn AccountStore, clerk_id: &str) -> ServiceResult<Vec<Site>> {
    Ok(store.sites_for(clerk_id)?)
}

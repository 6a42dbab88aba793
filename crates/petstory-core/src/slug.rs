//! Slug normalization and order-directory allocation.
//!
//! Pure path computation; directory creation is the caller's job. An order's
//! working directory is `base/<email-slug>/<pet-slug>_<timestamp>/` and is
//! never shared between orders because the caller supplies a fresh timestamp
//! per submission.

use std::path::{Path, PathBuf};

/// Longest pet-name slug kept, to stay clear of filesystem path limits.
const MAX_NAME_SLUG_LEN: usize = 50;

/// Lowercase, keep ASCII alphanumerics, map separator-ish characters to a
/// hyphen, collapse runs and trim the ends.
fn slugify(input: &str, separators: &[char]) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if separators.contains(&c) || c == '-' {
            if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        // Anything else (accents, emoji, punctuation) is stripped.
    }
    slug.trim_matches('-').to_string()
}

/// Slug for an email address: `user@example.com` becomes `user-example-com`.
pub fn email_slug(email: &str) -> String {
    slugify(email, &['@', '.'])
}

/// Slug for a pet name: `Max the Dog` becomes `max-the-dog`, capped at 50
/// characters.
pub fn name_slug(name: &str) -> String {
    let mut slug = slugify(name, &[' ']);
    if slug.len() > MAX_NAME_SLUG_LEN {
        slug.truncate(MAX_NAME_SLUG_LEN);
        slug = slug.trim_matches('-').to_string();
    }
    slug
}

/// Working directory for one order.
///
/// Inputs that normalize to an empty slug degrade rather than fail: an empty
/// pet slug leaves a component of just the timestamp, an empty email slug
/// skips that path level.
pub fn order_dir(base_dir: &Path, email: &str, pet_name: &str, timestamp: &str) -> PathBuf {
    let email_part = email_slug(email);
    let pet_part = name_slug(pet_name);

    let order_component = if pet_part.is_empty() {
        timestamp.to_string()
    } else {
        format!("{pet_part}_{timestamp}")
    };

    let mut dir = base_dir.to_path_buf();
    if !email_part.is_empty() {
        dir.push(email_part);
    }
    dir.push(order_component);
    dir
}

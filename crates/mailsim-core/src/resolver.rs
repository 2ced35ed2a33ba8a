//! Recipient and attachment resolution.

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, error, warn};

use crate::operation::{AttachmentSpec, RandomAttachments, RandomRecipients, RecipientSpec};
use crate::store::MailStore;
use crate::{Error, Result};

/// Expand a recipient specification into addresses.
///
/// Explicit recipients are returned as configured. Random recipients are
/// drawn without replacement from the global address list, or from one
/// distribution list when named. No specification yields an empty list.
///
/// # Errors
///
/// Returns [`Error::EmptyAddressPool`] if the address book is unavailable or
/// has nobody matching, or a store error if the query fails.
pub fn resolve_recipients<R: Rng + ?Sized>(
    operation: &str,
    spec: &RecipientSpec,
    store: &dyn MailStore,
    rng: &mut R,
) -> Result<Vec<String>> {
    match spec {
        RecipientSpec::None => Ok(Vec::new()),
        RecipientSpec::Explicit(addresses) => Ok(addresses.clone()),
        RecipientSpec::Random(random) => random_recipients(operation, random, store, rng),
    }
}

fn random_recipients<R: Rng + ?Sized>(
    operation: &str,
    spec: &RandomRecipients,
    store: &dyn MailStore,
    rng: &mut R,
) -> Result<Vec<String>> {
    let source = spec.distribution_list.as_deref().map_or_else(
        || "global address list".to_string(),
        |dl| format!("distribution list {dl}"),
    );
    let Some(book) = store.global_address_list()? else {
        return Err(Error::EmptyAddressPool(source));
    };
    let pool = match spec.distribution_list.as_deref() {
        Some(dl) => book.dl_members(dl, spec.user_count_for_randomization)?,
        None => book.users(None, spec.user_count_for_randomization)?,
    };
    if pool.is_empty() {
        return Err(Error::EmptyAddressPool(source));
    }

    let count = match spec.count as usize {
        0 => rng.gen_range(1..=pool.len()),
        requested if requested > pool.len() => {
            warn!(
                operation,
                "Only {} user(s) in the {source}, adjusting the recipient count from {requested}",
                pool.len()
            );
            pool.len()
        }
        requested => requested,
    };
    debug!(
        operation,
        count,
        pool = pool.len(),
        "Picking random recipients"
    );
    Ok(draw(pool, count, rng))
}

/// Expand an attachment specification into file paths.
///
/// Explicit attachments are returned as configured and are not checked for
/// existence. Random attachments are drawn without replacement from the
/// files of a directory; a missing directory yields no attachments.
pub fn resolve_attachments<R: Rng + ?Sized>(
    operation: &str,
    spec: &AttachmentSpec,
    rng: &mut R,
) -> Vec<PathBuf> {
    match spec {
        AttachmentSpec::None => Vec::new(),
        AttachmentSpec::Explicit(paths) => paths.clone(),
        AttachmentSpec::Random(random) => random_attachments(operation, random, rng),
    }
}

fn random_attachments<R: Rng + ?Sized>(
    operation: &str,
    spec: &RandomAttachments,
    rng: &mut R,
) -> Vec<PathBuf> {
    let files = match list_files(&spec.directory) {
        Ok(files) => files,
        Err(e) => {
            error!(
                operation,
                directory = %spec.directory.display(),
                error = %e,
                "Unable to list attachment directory"
            );
            return Vec::new();
        }
    };

    let count = match spec.count as usize {
        0 => rng.gen_range(0..=files.len()),
        requested if requested > files.len() => {
            warn!(
                operation,
                "Only {} file(s) in {}, adjusting the attachment count from {requested}",
                files.len(),
                spec.directory.display()
            );
            files.len()
        }
        requested => requested,
    };
    draw(files, count, rng)
}

fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn draw<T, R: Rng + ?Sized>(mut pool: Vec<T>, count: usize, rng: &mut R) -> Vec<T> {
    let mut picked = Vec::with_capacity(count.min(pool.len()));
    while picked.len() < count && !pool.is_empty() {
        let index = rng.gen_range(0..pool.len());
        picked.push(pool.swap_remove(index));
    }
    picked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::store::MemoryStore;

    fn store_with_users(n: usize) -> MemoryStore {
        let store = MemoryStore::new("Load User", "load@contoso.com");
        for i in 0..n {
            store.add_user(format!("User {i}"), format!("user{i}@contoso.com"));
        }
        store
    }

    fn random(count: u32, dl: Option<&str>) -> RecipientSpec {
        RecipientSpec::Random(RandomRecipients {
            count,
            distribution_list: dl.map(str::to_string),
            user_count_for_randomization: 1000,
        })
    }

    #[test]
    fn test_explicit_recipients_verbatim() {
        let store = store_with_users(0);
        let mut rng = StdRng::seed_from_u64(1);
        let spec = RecipientSpec::Explicit(vec!["b@contoso.com".into(), "a@contoso.com".into()]);
        let resolved = resolve_recipients("op", &spec, &store, &mut rng).unwrap();
        assert_eq!(resolved, vec!["b@contoso.com", "a@contoso.com"]);
        assert!(resolve_recipients("op", &RecipientSpec::None, &store, &mut rng)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_random_recipients_are_distinct() {
        let store = store_with_users(10);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let mut resolved =
                resolve_recipients("op", &random(10, None), &store, &mut rng).unwrap();
            assert_eq!(resolved.len(), 10);
            resolved.sort();
            resolved.dedup();
            assert_eq!(resolved.len(), 10);
        }
    }

    #[test]
    fn test_random_recipient_count_is_clamped() {
        let store = store_with_users(3);
        let mut rng = StdRng::seed_from_u64(2);
        let resolved = resolve_recipients("op", &random(8, None), &store, &mut rng).unwrap();
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn test_random_recipient_zero_picks_at_least_one() {
        let store = store_with_users(4);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let n = resolve_recipients("op", &random(0, None), &store, &mut rng)
                .unwrap()
                .len();
            assert!((1..=4).contains(&n));
        }
    }

    #[test]
    fn test_distribution_list_members() {
        let store = store_with_users(5);
        store.add_distribution_list("Team", vec!["x@contoso.com".into(), "y@contoso.com".into()]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut resolved =
            resolve_recipients("op", &random(2, Some("team")), &store, &mut rng).unwrap();
        resolved.sort();
        assert_eq!(resolved, vec!["x@contoso.com", "y@contoso.com"]);
    }

    #[test]
    fn test_empty_pool_fails() {
        let store = store_with_users(0);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(matches!(
            resolve_recipients("op", &random(1, None), &store, &mut rng),
            Err(Error::EmptyAddressPool(_))
        ));
        assert!(matches!(
            resolve_recipients("op", &random(1, Some("Nobody")), &store, &mut rng),
            Err(Error::EmptyAddressPool(_))
        ));
    }

    fn attachment_dir(files: usize) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..files {
            std::fs::write(dir.path().join(format!("file{i}.txt")), "data").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        dir
    }

    #[test]
    fn test_random_attachment_zero_is_uniform_from_zero() {
        let dir = attachment_dir(3);
        let spec = AttachmentSpec::Random(RandomAttachments {
            count: 0,
            directory: dir.path().to_path_buf(),
        });
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [0usize; 4];
        for _ in 0..4000 {
            let picked = resolve_attachments("op", &spec, &mut rng);
            let mut unique = picked.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), picked.len());
            assert!(picked.iter().all(|p| p.is_file()));
            seen[picked.len()] += 1;
        }
        for hits in seen {
            assert!((850..1150).contains(&hits), "skewed distribution: {seen:?}");
        }
    }

    #[test]
    fn test_random_attachments_clamped_and_soft_failing() {
        let dir = attachment_dir(2);
        let mut rng = StdRng::seed_from_u64(4);
        let spec = AttachmentSpec::Random(RandomAttachments {
            count: 5,
            directory: dir.path().to_path_buf(),
        });
        assert_eq!(resolve_attachments("op", &spec, &mut rng).len(), 2);

        let empty = attachment_dir(0);
        let spec = AttachmentSpec::Random(RandomAttachments {
            count: 0,
            directory: empty.path().to_path_buf(),
        });
        assert!(resolve_attachments("op", &spec, &mut rng).is_empty());

        let spec = AttachmentSpec::Random(RandomAttachments {
            count: 1,
            directory: dir.path().join("does-not-exist"),
        });
        assert!(resolve_attachments("op", &spec, &mut rng).is_empty());
    }

    #[test]
    fn test_explicit_attachments_unchecked() {
        let mut rng = StdRng::seed_from_u64(4);
        let spec = AttachmentSpec::Explicit(vec![PathBuf::from("missing.doc")]);
        assert_eq!(
            resolve_attachments("op", &spec, &mut rng),
            vec![PathBuf::from("missing.doc")]
        );
    }
}

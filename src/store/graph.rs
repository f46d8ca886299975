use indexmap::IndexMap;

use super::Fragment;

/// What to do when a walk reaches a key that is no longer stored.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum Missing {
    Fail,
    Skip,
}

/// Dependency closure of `roots`: depth-first per root, each dependency emitted before its
/// dependents, de-duplicated in first-seen order. Roots are included.
///
/// Returns the first missing key as the error when `missing` is `Fail`.
pub(super) fn closure<'a, I>(
    fragments: &IndexMap<String, Fragment>,
    roots: I,
    missing: Missing,
) -> Result<Vec<String>, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ordered = Vec::new();
    let mut in_progress = Vec::new();
    for root in roots {
        visit(fragments, root, missing, &mut in_progress, &mut ordered)?;
    }
    Ok(ordered)
}

fn visit(
    fragments: &IndexMap<String, Fragment>,
    key: &str,
    missing: Missing,
    in_progress: &mut Vec<String>,
    ordered: &mut Vec<String>,
) -> Result<(), String> {
    // an edge back into the current path is skipped so rendering always terminates
    if ordered.iter().any(|k| k == key) || in_progress.iter().any(|k| k == key) {
        return Ok(());
    }
    let Some(fragment) = fragments.get(key) else {
        return match missing {
            Missing::Fail => Err(key.to_string()),
            Missing::Skip => Ok(()),
        };
    };

    in_progress.push(key.to_string());
    for dep in &fragment.depends_on {
        visit(fragments, dep, missing, in_progress, ordered)?;
    }
    in_progress.pop();
    ordered.push(key.to_string());
    Ok(())
}

/// Stored keys whose closure contains `key`, in store order.
pub(super) fn dependents_of(fragments: &IndexMap<String, Fragment>, key: &str) -> Vec<String> {
    fragments
        .keys()
        .filter(|other| other.as_str() != key)
        .filter(|other| {
            closure(fragments, [other.as_str()], Missing::Skip)
                .is_ok_and(|deps| deps.iter().any(|d| d == key))
        })
        .cloned()
        .collect()
}

use emberchat_backend::{NewMessage, Session};
use emberchat_filter::ProfanityFilter;

/// Builds the append payload for a draft, or `None` when the draft must not
/// produce an append at all.
///
/// Empty and whitespace-only drafts are inert. Matched terms are masked by
/// the injected filter; everything else is passed through verbatim,
/// untrimmed. Authorship comes from the session handed in by the caller.
pub fn prepare_submission(
    session: &Session,
    draft: &str,
    filter: &dyn ProfanityFilter,
) -> Option<NewMessage> {
    if draft.trim().is_empty() {
        return None;
    }

    Some(NewMessage {
        text: filter.clean(draft),
        author_uid: session.uid.clone(),
        author_photo_url: session.photo_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use emberchat_backend::{IdentityProvider, UserId};
    use emberchat_filter::WordListFilter;

    use super::*;

    fn session() -> Session {
        Session {
            uid: UserId::new("uid-1"),
            id_token: "tok".to_string(),
            photo_url: Some("https://img.example/uid-1.png".to_string()),
            provider: IdentityProvider::Google,
        }
    }

    fn filter() -> WordListFilter {
        WordListFilter::new(["blocked"])
    }

    #[test]
    fn unfiltered_draft_passes_through_verbatim() {
        let new_message = prepare_submission(&session(), "hello", &filter()).unwrap();
        assert_eq!(new_message.text, "hello");
        assert_eq!(new_message.author_uid, UserId::new("uid-1"));
        assert_eq!(
            new_message.author_photo_url.as_deref(),
            Some("https://img.example/uid-1.png")
        );
    }

    #[test]
    fn matched_terms_are_masked_before_append() {
        let new_message = prepare_submission(&session(), "blocked there", &filter()).unwrap();
        assert_eq!(new_message.text, "******* there");
        assert!(!new_message.text.contains("blocked"));
    }

    #[test]
    fn empty_draft_produces_no_append() {
        assert!(prepare_submission(&session(), "", &filter()).is_none());
    }

    #[test]
    fn whitespace_only_draft_produces_no_append() {
        assert!(prepare_submission(&session(), "   \n\t ", &filter()).is_none());
    }

    #[test]
    fn session_without_photo_yields_no_photo_field() {
        let mut session = session();
        session.photo_url = None;
        let new_message = prepare_submission(&session, "hi", &filter()).unwrap();
        assert_eq!(new_message.author_photo_url, None);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use crate::{
        error::{Error, ErrorCode},
        models::{CreatePollOption, CreatePollRequest, Poll, PollOption, VoteVisibility},
        pagination::{Page, PageQuery, PageRef, PageWindow},
        validation::{parse_id_list, validate_poll_request, ValidationError, MAX_IDS_PER_QUERY},
        caller::Caller,
    };

    fn poll_request(title: &str, options: &[&str]) -> CreatePollRequest {
        CreatePollRequest {
            title: title.to_string(),
            options: options.iter().map(|content| CreatePollOption { content: content.to_string() }).collect(),
        }
    }

    #[test]
    fn test_poll_validation() {
        assert!(validate_poll_request(&poll_request("Best pizza?", &["Margherita", "Funghi"])).is_ok());
        assert!(validate_poll_request(&poll_request("Café ou chá?", &["Café", "Chá"])).is_ok());
        assert!(validate_poll_request(&poll_request("Ação ÀÇÑ", &["Pão", "Açaí"])).is_ok());

        assert_eq!(validate_poll_request(&poll_request("", &["A"])), Err(ValidationError::InvalidTitleLength));
        assert_eq!(
            validate_poll_request(&poll_request(&"x".repeat(51), &["A"])),
            Err(ValidationError::InvalidTitleLength)
        );
        assert_eq!(validate_poll_request(&poll_request("<script>", &["A"])), Err(ValidationError::InvalidTitleCharacters));
        assert_eq!(validate_poll_request(&poll_request("Straße", &["A"])), Err(ValidationError::InvalidTitleCharacters));
        assert_eq!(validate_poll_request(&poll_request("数字", &["A"])), Err(ValidationError::InvalidTitleCharacters));
        assert_eq!(validate_poll_request(&poll_request("Digits", &["٣"])), Err(ValidationError::InvalidOptionCharacters("٣".into())));
        assert_eq!(validate_poll_request(&poll_request("Empty", &[])), Err(ValidationError::TooFewOptions));
        assert_eq!(validate_poll_request(&poll_request("Blank", &[""])), Err(ValidationError::InvalidOptionLength));
        assert_eq!(
            validate_poll_request(&poll_request("Dupes", &["Yes", "yes"])),
            Err(ValidationError::DuplicateOption("yes".into()))
        );

        let many: Vec<String> = (0..21).map(|i| format!("Option {i}")).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        assert_eq!(validate_poll_request(&poll_request("Many", &many)), Err(ValidationError::TooManyOptions));
    }

    #[test]
    fn test_poll_request_rejects_tally_fields() {
        let payload = r#"{"title":"Rigged","options":[{"content":"A","voteQuantity":100}]}"#;
        assert!(serde_json::from_str::<CreatePollRequest>(payload).is_err());

        let payload = r#"{"title":"Rigged","options":[{"content":"A"}],"voteQuantity":5}"#;
        assert!(serde_json::from_str::<CreatePollRequest>(payload).is_err());
    }

    #[test]
    fn test_visibility_wire_format() {
        assert_eq!(serde_json::to_string(&VoteVisibility::Public).unwrap(), "\"public\"");
        assert_eq!(serde_json::from_str::<VoteVisibility>("\"private\"").unwrap(), VoteVisibility::Private);
        assert!(serde_json::from_str::<VoteVisibility>("\"secret\"").is_err());
    }

    #[test]
    fn test_id_list_parsing() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(parse_id_list(Some(&format!("{a}, {b}"))).unwrap(), vec![a, b]);
        assert_eq!(parse_id_list(None), Err(ValidationError::MissingIds));
        assert_eq!(parse_id_list(Some(" , ")), Err(ValidationError::MissingIds));
        assert_eq!(parse_id_list(Some("nope")), Err(ValidationError::InvalidId("nope".into())));

        let too_many = vec![a.to_string(); MAX_IDS_PER_QUERY + 1].join(",");
        assert_eq!(parse_id_list(Some(&too_many)), Err(ValidationError::TooManyIds));
    }

    #[test]
    fn test_page_query_bounds() {
        assert_eq!(PageQuery::parse(Some(2), Some(10)).unwrap().offset(), 10);

        for (page, limit) in [(None, Some(10)), (Some(0), Some(10)), (Some(1), None), (Some(1), Some(0)), (Some(1), Some(101))] {
            let err = PageQuery::parse(page, limit).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidInput, "page={page:?} limit={limit:?}");
        }
    }

    #[test]
    fn test_page_window_links() {
        let query = PageQuery::parse(Some(2), Some(10)).unwrap();
        let window = PageWindow::new(query, 25, "Polls").unwrap();
        assert_eq!(window.offset(), 10);
        assert_eq!(window.previous(), Some(PageRef { page: 1, limit: 10 }));
        assert_eq!(window.next(), Some(PageRef { page: 3, limit: 10 }));
        assert_eq!(window.last(), PageRef { page: 3, limit: 10 });

        let first = PageWindow::new(PageQuery::parse(Some(1), Some(10)).unwrap(), 10, "Polls").unwrap();
        assert_eq!(first.previous(), None);
        assert_eq!(first.next(), None);
        assert_eq!(first.last(), PageRef { page: 1, limit: 10 });

        let page: Page<u8> = Page::new(vec![1, 2], &first);
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("previous").is_none());
        assert_eq!(json["last"]["page"], 1);
    }

    #[test]
    fn test_page_window_not_found() {
        let query = PageQuery::parse(Some(1), Some(10)).unwrap();
        let err = PageWindow::new(query, 0, "Votes").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Votes not found");

        let beyond = PageQuery::parse(Some(4), Some(10)).unwrap();
        let err = PageWindow::new(beyond, 30, "Votes").unwrap_err();
        assert_eq!(err.message, "Page not found");
    }

    #[test]
    fn test_tally_consistency_check() {
        let mut poll = Poll {
            id: Uuid::new_v4(),
            title: "Lunch".into(),
            options: vec![
                PollOption { id: Uuid::new_v4(), content: "Soup".into(), vote_quantity: 2 },
                PollOption { id: Uuid::new_v4(), content: "Salad".into(), vote_quantity: 1 },
            ],
            vote_quantity: 3,
            creator: "user-1".into(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        assert!(poll.tally_is_consistent());
        assert!(poll.has_option(poll.options[1].id));
        assert!(!poll.has_option(Uuid::new_v4()));

        poll.vote_quantity = 4;
        assert!(!poll.tally_is_consistent());
    }

    #[test]
    fn test_caller_from_header() {
        let caller = Caller::from_header(Some("  user-7 ")).unwrap();
        assert_eq!(caller.user_id, "user-7");
        assert!(Caller::from_header(Some("   ")).is_none());
        assert!(Caller::from_header(None).is_none());
    }

    #[test]
    fn test_error_body_shape() {
        let error = Error::not_found("Poll not found");
        assert_eq!(error.to_string(), "Resource not found: Poll not found");
        let body = serde_json::to_value(&error).unwrap();
        assert_eq!(body, serde_json::json!({ "code": "notFound", "message": "Poll not found" }));
    }
}

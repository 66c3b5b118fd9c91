#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use cds_model::{Model, PageConfig};
    use cqn::{Column, DataValue, Limit, Operator, OrderBy, Query, Sort, Token};
    use odata_core::ast::{CompareOperator, Expr, Value};
    use odata_core::{
        parse_orderby, KeyPredicate, ODataOrderBy, ODataQuery, ODataRequest, OrderByItem,
        ResourcePath, SkipToken, SortDir,
    };
    use serde_json::json;

    use crate::*;

    const CSN: &str = r#"{
      "definitions": {
        "CatalogService": { "kind": "service", "@cds.query.limit.max": 500 },
        "CatalogService.Books": {
          "kind": "entity",
          "elements": {
            "ID": { "key": true, "type": "cds.Integer" },
            "title": { "type": "cds.String" },
            "stock": { "type": "cds.Integer" },
            "cover": { "type": "cds.LargeBinary" },
            "modifiedAt": { "type": "cds.Timestamp", "@odata.etag": true },
            "price": { "elements": { "amount": { "type": "cds.Decimal" }, "currency": { "type": "cds.String" } } },
            "author": { "type": "cds.Association", "target": "CatalogService.Authors" },
            "pages": { "type": "cds.Composition", "target": "CatalogService.Pages", "cardinality": { "max": "*" } }
          }
        },
        "CatalogService.Authors": {
          "kind": "entity",
          "@cds.default.order": [ { "by": { "=": "name" } }, { "by": { "=": "born" }, "desc": true } ],
          "elements": {
            "ID": { "key": true, "type": "cds.Integer" },
            "name": { "type": "cds.String" },
            "born": { "type": "cds.Date" },
            "portrait": { "type": "cds.Binary" }
          }
        },
        "CatalogService.Pages": {
          "kind": "entity",
          "@cds.query.limit": { "default": 25, "max": 50 },
          "elements": {
            "ID": { "key": true, "type": "cds.Integer" },
            "text": { "type": "cds.String" },
            "scan": { "type": "cds.Binary" },
            "book": { "type": "cds.Association", "target": "CatalogService.Books" }
          }
        },
        "CatalogService.Drafts": {
          "kind": "entity",
          "@odata.draft.enabled": true,
          "elements": { "ID": { "key": true, "type": "cds.UUID" }, "note": { "type": "cds.String" } }
        },
        "CatalogService.Pairs": {
          "kind": "entity",
          "elements": {
            "left": { "key": true, "type": "cds.Integer" },
            "right": { "key": true, "type": "cds.Integer" }
          }
        },
        "CatalogService.ByYear": {
          "kind": "entity",
          "@cds.query.limit": { "default": 10 },
          "params": { "year": { "type": "cds.Integer" } },
          "elements": { "ID": { "key": true, "type": "cds.Integer" } }
        }
      }
    }"#;

    fn model() -> Model {
        Model::from_json_str(CSN).unwrap()
    }

    fn ctx<'a>(model: &'a Model, set: &str) -> TranslationContext<'a> {
        TranslationContext::new(model, model.entity_in("CatalogService", set).unwrap())
            .with_service(model.service("CatalogService").unwrap())
    }

    fn names(columns: &[Column]) -> Vec<&str> {
        columns.iter().filter_map(Column::as_name).collect()
    }

    fn collection(set: &str, query: ODataQuery) -> ODataRequest {
        ODataRequest::new(ResourcePath::entity_set(set), query)
    }

    fn single(set: &str, keys: KeyPredicate) -> ODataRequest {
        ODataRequest::new(ResourcePath::entity_set(set).with_keys(keys), ODataQuery::new())
    }

    fn int(n: i64) -> Value {
        Value::Number(n.into())
    }

    // ---- select ----

    #[test]
    fn select_always_includes_keys_once() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let keys = books.key_names();

        let cols = select_to_cqn("title", &keys, books).unwrap().unwrap();
        assert_eq!(names(&cols), vec!["title", "ID", "modifiedAt"]);

        let cols = select_to_cqn("ID,title,ID", &keys, books).unwrap().unwrap();
        assert_eq!(names(&cols).iter().filter(|c| **c == "ID").count(), 1);
    }

    #[test]
    fn select_star_means_all_columns() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let keys = books.key_names();
        assert_eq!(select_to_cqn("*", &keys, books).unwrap(), None);
        assert_eq!(select_to_cqn("title,*,stock", &keys, books).unwrap(), None);
    }

    #[test]
    fn select_skips_relationships_and_flattens_structs() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let keys = books.key_names();

        let cols = select_to_cqn("author,pages,author/name,price", &keys, books)
            .unwrap()
            .unwrap();
        assert_eq!(
            names(&cols),
            vec!["price_amount", "price_currency", "ID", "modifiedAt"]
        );

        let cols = select_to_cqn("price/currency", &keys, books).unwrap().unwrap();
        assert_eq!(names(&cols), vec!["price_currency", "ID", "modifiedAt"]);
    }

    #[test]
    fn select_unknown_property_is_rejected() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        assert!(matches!(
            select_to_cqn("isbn", &books.key_names(), books),
            Err(Error::UnknownProperty { property, .. }) if property == "isbn"
        ));
    }

    // ---- orderby ----

    #[test]
    fn orderby_explicit_wins_over_default() {
        let m = model();
        let authors = m.entity_in("CatalogService", "Authors").unwrap();
        let order = parse_orderby("name desc").unwrap();

        let out = order_by_to_cqn(&order, authors).unwrap();
        assert_eq!(
            out,
            vec![
                OrderBy::column("name", Sort::Desc),
                OrderBy::column("born", Sort::Desc),
            ]
        );
    }

    #[test]
    fn orderby_falls_back_to_keys() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let out = order_by_to_cqn(&ODataOrderBy::empty(), books).unwrap();
        assert_eq!(out, vec![OrderBy::column("ID", Sort::Asc)]);

        let out = order_by_to_cqn(&parse_orderby("ID desc").unwrap(), books).unwrap();
        assert_eq!(out, vec![OrderBy::column("ID", Sort::Desc)]);
    }

    #[test]
    fn orderby_default_skips_draft_columns() {
        let m = model();
        let drafts = m.entity_in("CatalogService", "Drafts").unwrap();
        let out = order_by_to_cqn(&ODataOrderBy::empty(), drafts).unwrap();
        assert_eq!(out, vec![OrderBy::column("ID", Sort::Asc)]);
    }

    #[test]
    fn orderby_navigation_path_and_function() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let order = parse_orderby("author/name, tolower(title) desc").unwrap();
        let out = order_by_to_cqn(&order, books).unwrap();

        assert_eq!(out[0].expr, Token::reference(["author", "name"]));
        assert_eq!(out[0].sort, Sort::Asc);
        assert_eq!(
            out[1],
            OrderBy::new(
                Token::func("tolower", vec![Token::reference(["title"])]),
                Sort::Desc
            )
        );
        // the navigation path does not cover the key column
        assert_eq!(out[2], OrderBy::column("ID", Sort::Asc));
    }

    #[test]
    fn orderby_literal_is_not_supported() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let order = ODataOrderBy(vec![OrderByItem {
            expr: Expr::Value(int(1)),
            dir: SortDir::Asc,
        }]);
        assert_eq!(
            order_by_to_cqn(&order, books),
            Err(Error::NotSupported {
                option: "$orderby",
                kind: "literal"
            })
        );

        let order = ODataOrderBy(vec![OrderByItem {
            expr: Expr::Compare(
                Box::new(Expr::identifier("stock")),
                CompareOperator::Gt,
                Box::new(Expr::Value(int(1))),
            ),
            dir: SortDir::Desc,
        }]);
        assert!(matches!(
            order_by_to_cqn(&order, books),
            Err(Error::NotSupported { kind: "binary", .. })
        ));
    }

    // ---- pagination ----

    #[test]
    fn pagination_cursor_with_top_and_max() {
        let cfg = PageConfig::new(None, Some(50));
        let limit = page_limit(Some(40), Some(5), 20, cfg);
        assert_eq!(limit.offset, 25);
        assert_eq!(limit.rows, Some(20));

        // nothing of $top left: keep the requested count
        let limit = page_limit(Some(10), None, 20, cfg);
        assert_eq!(limit, Limit::new(Some(10), 20));

        // never above the maximum
        let limit = page_limit(Some(400), None, 20, cfg);
        assert_eq!(limit.rows, Some(50));
    }

    #[test]
    fn pagination_default_page_size() {
        let cfg = PageConfig::new(Some(25), None);
        assert_eq!(page_limit(None, None, 0, cfg), Limit::new(Some(25), 0));
    }

    #[test]
    fn pagination_without_cursor() {
        let cfg = PageConfig::new(Some(25), Some(50));
        assert_eq!(page_limit(Some(80), None, 0, cfg).rows, Some(50));
        assert_eq!(page_limit(Some(10), Some(3), 0, cfg), Limit::new(Some(10), 3));
        assert_eq!(
            page_limit(Some(80), None, 0, PageConfig::default()).rows,
            Some(80)
        );
        assert_eq!(page_limit(None, None, 0, PageConfig::default()).rows, None);
        assert_eq!(
            page_limit(None, None, 0, PageConfig::new(None, Some(50))).rows,
            Some(50)
        );
        assert_eq!(
            page_limit(None, None, 0, PageConfig::new(Some(100), Some(50))).rows,
            Some(50)
        );
    }

    #[test]
    fn next_token_only_for_server_limited_full_pages() {
        let full = Limit::new(Some(25), 0);
        assert_eq!(next_skip_token(None, 0, &full, 25), Some(SkipToken::new(25)));
        assert_eq!(next_skip_token(None, 0, &full, 24), None);
        assert_eq!(
            next_skip_token(None, 25, &Limit::new(Some(25), 25), 25),
            Some(SkipToken::new(50))
        );

        // client asked for exactly what was delivered
        assert_eq!(next_skip_token(Some(25), 0, &full, 25), None);
        // client asked for more than the server maximum
        assert_eq!(
            next_skip_token(Some(100), 0, &full, 25),
            Some(SkipToken::new(25))
        );
        assert_eq!(next_skip_token(None, 0, &Limit::new(None, 0), 1000), None);
    }

    #[test]
    fn pagination_offsets_saturate_instead_of_overflowing() {
        let limit = page_limit(None, Some(u64::MAX), 1, PageConfig::default());
        assert_eq!(limit, Limit::new(None, u64::MAX));

        let limit = page_limit(Some(5), Some(u64::MAX - 1), 3, PageConfig::default());
        assert_eq!(limit.offset, u64::MAX);

        assert_eq!(
            next_skip_token(None, u64::MAX, &Limit::new(Some(1), 0), 1),
            Some(SkipToken::new(u64::MAX))
        );
    }

    #[test]
    fn page_config_resolution_order() {
        let m = model();
        assert_eq!(
            ctx(&m, "Pages").page_config(),
            PageConfig::new(Some(25), Some(50))
        );
        // service maximum applies where the entity has none
        assert_eq!(
            ctx(&m, "Books")
                .with_defaults(PageConfig::new(Some(100), Some(1000)))
                .page_config(),
            PageConfig::new(Some(100), Some(500))
        );
        // parameterized views are not paged
        assert_eq!(ctx(&m, "ByYear").page_config(), PageConfig::default());
    }

    // ---- dispatcher ----

    #[test]
    fn read_collection_builds_full_select() {
        let m = model();
        let query = ODataQuery::new()
            .with_filter(Expr::Compare(
                Box::new(Expr::identifier("stock")),
                CompareOperator::Gt,
                Box::new(Expr::Value(int(3))),
            ))
            .with_select("title")
            .with_order(parse_orderby("title").unwrap())
            .with_top(10);
        let q = odata_to_cqn(
            OperationKind::Read,
            &collection("Books", query),
            None,
            &ctx(&m, "Books"),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({
                "SELECT": {
                    "from": { "ref": ["CatalogService.Books"] },
                    "columns": [ { "ref": ["title"] }, { "ref": ["ID"] }, { "ref": ["modifiedAt"] } ],
                    "where": [ { "ref": ["stock"] }, ">", { "val": 3 } ],
                    "orderBy": [ { "ref": ["title"], "sort": "asc" }, { "ref": ["ID"], "sort": "asc" } ],
                    "limit": { "rows": 10, "offset": 0 }
                }
            })
        );
    }

    #[test]
    fn read_count_segment() {
        let m = model();
        let mut path = ResourcePath::entity_set("Books");
        path.count = true;
        let q = odata_to_cqn(
            OperationKind::Read,
            &ODataRequest::new(path, ODataQuery::new().with_top(3)),
            None,
            &ctx(&m, "Books"),
        )
        .unwrap();
        let select = q.as_select().unwrap();
        assert!(select.is_count());
        assert!(select.limit.is_none());
    }

    #[test]
    fn read_single_with_draft_default() {
        let m = model();
        let q = odata_to_cqn(
            OperationKind::Read,
            &single(
                "Drafts",
                KeyPredicate::Single(Value::String("abc".into())),
            ),
            None,
            &ctx(&m, "Drafts"),
        )
        .unwrap();
        let select = q.as_select().unwrap();
        assert!(select.one);
        assert_eq!(
            select.where_,
            vec![
                Token::reference(["ID"]),
                Token::op(Operator::Eq),
                Token::val("abc"),
                Token::op(Operator::And),
                Token::reference(["IsActiveEntity"]),
                Token::op(Operator::Eq),
                Token::val(true),
            ]
        );
    }

    #[test]
    fn unnamed_key_needs_single_key_entity() {
        let m = model();
        let err = odata_to_cqn(
            OperationKind::Read,
            &single("Pairs", KeyPredicate::Single(int(1))),
            None,
            &ctx(&m, "Pairs"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));

        let err = odata_to_cqn(
            OperationKind::Delete,
            &single("Pairs", KeyPredicate::Named(vec![("left".into(), int(1))])),
            None,
            &ctx(&m, "Pairs"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { reason, .. } if reason.contains("right")));
    }

    #[test]
    fn create_update_delete() {
        let m = model();
        let data: DataValue = json!({ "ID": 7, "title": "Dune" }).into();

        let q = odata_to_cqn(
            OperationKind::Create,
            &collection("Books", ODataQuery::new()),
            Some(&data),
            &ctx(&m, "Books"),
        )
        .unwrap();
        assert!(matches!(&q, Query::Insert(i) if i.entries == vec![data.clone()]));

        let req = single("Books", KeyPredicate::Single(int(7)));
        let q = odata_to_cqn(OperationKind::Update, &req, Some(&data), &ctx(&m, "Books")).unwrap();
        match q {
            Query::Update(u) => {
                assert_eq!(u.data, DataValue::from(json!({ "title": "Dune" })));
                assert_eq!(u.where_.len(), 3);
            }
            other => panic!("expected UPDATE, got {:?}", other),
        }

        let q = odata_to_cqn(OperationKind::Delete, &req, None, &ctx(&m, "Books")).unwrap();
        assert_eq!(q.kind(), "DELETE");
        assert_eq!(q.entity(), "CatalogService.Books");
    }

    #[test]
    fn update_rejects_conflicting_key_and_missing_keys() {
        let m = model();
        let data: DataValue = json!({ "ID": 8, "title": "Dune" }).into();
        let req = single("Books", KeyPredicate::Single(int(7)));
        assert_eq!(
            odata_to_cqn(OperationKind::Update, &req, Some(&data), &ctx(&m, "Books")),
            Err(Error::KeyMismatch { key: "ID".into() })
        );

        let req = collection("Books", ODataQuery::new());
        assert!(matches!(
            odata_to_cqn(OperationKind::Update, &req, Some(&data), &ctx(&m, "Books")),
            Err(Error::MissingKeys { operation: "UPDATE", .. })
        ));
        assert!(matches!(
            odata_to_cqn(OperationKind::Create, &req, None, &ctx(&m, "Books")),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn bound_action_loads_instance() {
        let m = model();
        let req = ODataRequest::new(
            ResourcePath::entity_set("Books")
                .with_keys(KeyPredicate::Single(int(1)))
                .with_operation("CatalogService.order"),
            ODataQuery::new(),
        );
        let q = odata_to_cqn(OperationKind::BoundAction, &req, None, &ctx(&m, "Books")).unwrap();
        let select = q.as_select().unwrap();
        assert!(select.one);
        assert!(select.columns.is_none());
    }

    #[test]
    fn operation_kind_parsing() {
        assert_eq!("READ".parse::<OperationKind>(), Ok(OperationKind::Read));
        assert_eq!(
            "bound-action".parse::<OperationKind>(),
            Ok(OperationKind::BoundAction)
        );
        assert_eq!(
            "upsert".parse::<OperationKind>(),
            Err(Error::UnknownOperation("upsert".into()))
        );
        assert_eq!(OperationKind::Delete.to_string(), "delete");
    }

    // ---- filter ----

    #[test]
    fn filter_precedence_and_functions() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        // (stock gt 1 or stock lt 0) and contains(title,'x')
        let expr = Expr::And(
            Box::new(Expr::Or(
                Box::new(Expr::Compare(
                    Box::new(Expr::identifier("stock")),
                    CompareOperator::Gt,
                    Box::new(Expr::Value(int(1))),
                )),
                Box::new(Expr::Compare(
                    Box::new(Expr::identifier("stock")),
                    CompareOperator::Lt,
                    Box::new(Expr::Value(int(0))),
                )),
            )),
            Box::new(Expr::Function(
                "contains".into(),
                vec![
                    Expr::identifier("title"),
                    Expr::Value(Value::String("x".into())),
                ],
            )),
        );
        let tokens = filter_to_tokens(&expr, books).unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(matches!(&tokens[0], Token::Xpr { xpr } if xpr.len() == 7));
        assert_eq!(tokens[1], Token::op(Operator::And));
        assert!(matches!(&tokens[2], Token::Func { func, .. } if func == "contains"));
    }

    #[test]
    fn filter_structured_path_and_errors() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let expr = Expr::Compare(
            Box::new(Expr::identifier("price/currency")),
            CompareOperator::Eq,
            Box::new(Expr::Value(Value::String("EUR".into()))),
        );
        let tokens = filter_to_tokens(&expr, books).unwrap();
        assert_eq!(tokens[0], Token::reference(["price_currency"]));

        assert!(matches!(
            filter_to_tokens(&Expr::identifier("title"), books),
            Err(Error::BareIdentifier(_))
        ));
        assert!(matches!(
            filter_to_tokens(&Expr::Function("soundex".into(), vec![]), books),
            Err(Error::UnsupportedFunction(_))
        ));
        assert!(matches!(
            filter_to_tokens(
                &Expr::In(Box::new(Expr::identifier("nope")), vec![]),
                books
            ),
            Err(Error::UnknownProperty { .. })
        ));
    }

    // ---- binary codec ----

    #[test]
    fn binary_codec_round_trip_touches_only_binaries() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let bytes: Vec<u8> = (0u8..=255).collect();
        let mut data = DataValue::from(json!({
            "ID": 1,
            "title": "aGVsbG8=",
            "cover": null,
            "author": { "ID": 2, "portrait": "aGk=" },
            "pages": [ { "ID": 1, "scan": "AAEC", "text": "AAEC" } ]
        }));
        data.as_object_mut()
            .unwrap()
            .insert("cover".into(), DataValue::Binary(bytes.clone()));

        let original = data.clone();
        encode_binaries(&mut data, books, &m);
        assert!(data.get("cover").unwrap().as_str().is_some());
        assert_eq!(data.get("title"), original.get("title"));

        decode_binaries(&mut data, books, &m).unwrap();
        assert_eq!(data.get("cover").unwrap().as_bytes(), Some(bytes.as_slice()));
        assert_eq!(data.get("title").unwrap().as_str(), Some("aGVsbG8="));
        assert_eq!(
            data.get("author").unwrap().get("portrait").unwrap().as_bytes(),
            Some(&b"hi"[..])
        );
        let page = &data.get("pages").unwrap().as_array().unwrap()[0];
        assert_eq!(page.get("scan").unwrap().as_bytes(), Some(&[0u8, 1, 2][..]));
        assert_eq!(page.get("text").unwrap().as_str(), Some("AAEC"));
    }

    #[test]
    fn binary_decode_rejects_garbage() {
        let m = model();
        let pages = m.entity_in("CatalogService", "Pages").unwrap();
        let mut data = DataValue::from(json!({ "scan": "not base64!" }));
        assert_eq!(
            decode_binaries(&mut data, pages, &m),
            Err(Error::InvalidBinary {
                element: "scan".into()
            })
        );

        let mut scalar = DataValue::from(json!(42));
        assert!(decode_binaries(&mut scalar, pages, &m).is_ok());
        assert_eq!(scalar, DataValue::from(json!(42)));
    }

    #[test]
    fn binary_encode_follows_relationships_and_ignores_non_bytes() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let mut data = DataValue::from(json!({
            "cover": "already text",
            "pages": [ { "ID": 1, "scan": 42 }, { "ID": 2, "scan": null } ]
        }));
        let mut author = DataValue::from(json!({ "ID": 2 }));
        author
            .as_object_mut()
            .unwrap()
            .insert("portrait".into(), DataValue::Binary(b"hi".to_vec()));
        data.as_object_mut().unwrap().insert("author".into(), author);

        encode_binaries(&mut data, books, &m);
        assert_eq!(data.get("cover").unwrap().as_str(), Some("already text"));
        assert_eq!(
            data.get("author").unwrap().get("portrait").unwrap().as_str(),
            Some("aGk=")
        );
        let pages = data.get("pages").unwrap().as_array().unwrap();
        assert_eq!(pages[0].get("scan"), Some(&DataValue::from(json!(42))));
        assert_eq!(pages[1].get("scan"), Some(&DataValue::Null));
    }

    // ---- deep filter ----

    #[test]
    fn deep_filter_keeps_only_primitives_of_composition_children() {
        let m = model();
        let books = m.entity_in("CatalogService", "Books").unwrap();
        let data = DataValue::from(json!({
            "ID": 1,
            "title": "Dune",
            "author": { "ID": 3 },
            "unknown": true,
            "price": { "amount": 9.5, "currency": "EUR", "rate": 1 },
            "pages": [
                { "text": "a", "book": { "ID": 1 } },
                { "text": "b", "book": { "ID": 1 } },
                { "text": "c", "book": { "ID": 1 } }
            ]
        }));

        let filtered = filter_payload(&data, books, &m);
        assert_eq!(
            filtered.to_json(),
            json!({
                "ID": 1,
                "title": "Dune",
                "price": { "amount": 9.5, "currency": "EUR" },
                "pages": [ { "text": "a" }, { "text": "b" }, { "text": "c" } ]
            })
        );
        // input untouched
        assert!(data.get("author").is_some());
    }
}

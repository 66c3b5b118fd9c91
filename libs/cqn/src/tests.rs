#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use crate::*;
    use serde_json::json;

    #[test]
    fn select_serializes_with_verb_root() {
        let q: Query = Select::new("CatalogService.Books")
            .with_columns(Some(vec![Column::name("ID"), Column::name("title")]))
            .with_where(vec![
                Token::path("stock"),
                Token::op(Operator::Gt),
                Token::val(10),
            ])
            .with_order_by(vec![OrderBy::column("title", Sort::Desc)])
            .with_limit(Limit::new(Some(20), 40))
            .into();

        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({
                "SELECT": {
                    "from": { "ref": ["CatalogService.Books"] },
                    "columns": [ { "ref": ["ID"] }, { "ref": ["title"] } ],
                    "where": [ { "ref": ["stock"] }, ">", { "val": 10 } ],
                    "orderBy": [ { "ref": ["title"], "sort": "desc" } ],
                    "limit": { "rows": 20, "offset": 40 }
                }
            })
        );
    }

    #[test]
    fn empty_clauses_are_omitted() {
        let q: Query = Select::new("S.E").one().into();
        assert_eq!(
            serde_json::to_value(&q).unwrap(),
            json!({ "SELECT": { "from": { "ref": ["S.E"] }, "one": true } })
        );
    }

    #[test]
    fn unlimited_page_window_is_dropped() {
        let q = Select::new("S.E").with_limit(Limit::new(None, 0));
        assert!(q.limit.is_none());
        let q = Select::new("S.E").with_limit(Limit::new(None, 5));
        assert_eq!(q.limit, Some(Limit::new(None, 5)));
    }

    #[test]
    fn tokens_parse_back_from_json() {
        let tokens: Vec<Token> = serde_json::from_value(json!([
            { "ref": ["a", "b"] }, "=", { "val": "x" }, "and",
            { "xpr": [ { "func": "contains", "args": [ { "ref": ["t"] }, { "val": "z" } ] } ] },
            "or", { "ref": ["id"] }, "in", { "list": [ { "val": 1 }, { "val": 2 } ] }
        ]))
        .unwrap();

        assert_eq!(tokens[0], Token::reference(["a", "b"]));
        assert_eq!(tokens[1], Token::Op(Operator::Eq));
        assert!(matches!(&tokens[4], Token::Xpr { xpr } if matches!(&xpr[0], Token::Func { func, .. } if func == "contains")));
        assert!(matches!(&tokens[8], Token::List { list } if list.len() == 2));
    }

    #[test]
    fn order_term_with_function_keeps_sort() {
        let term = OrderBy::new(
            Token::func("tolower", vec![Token::path("title")]),
            Sort::Desc,
        );
        let v = serde_json::to_value(&term).unwrap();
        assert_eq!(
            v,
            json!({ "func": "tolower", "args": [ { "ref": ["title"] } ], "sort": "desc" })
        );
        let back: OrderBy = serde_json::from_value(v).unwrap();
        assert_eq!(back, term);
        assert_eq!(back.as_column(), None);
        assert_eq!(OrderBy::column("ID", Sort::Asc).as_column(), Some("ID"));
    }

    #[test]
    fn conjunction_wraps_disjunctions() {
        let keys = vec![Token::path("ID"), Token::op(Operator::Eq), Token::val(1)];
        let filter = vec![
            Token::path("a"),
            Token::op(Operator::Eq),
            Token::val(1),
            Token::op(Operator::Or),
            Token::path("b"),
            Token::op(Operator::Eq),
            Token::val(2),
        ];
        let joined = conjunction(vec![keys.clone(), Vec::new(), filter.clone()]);
        assert_eq!(joined.len(), 5);
        assert_eq!(joined[3], Token::op(Operator::And));
        assert_eq!(joined[4], Token::xpr(filter));
    }

    #[test]
    fn count_query_keeps_where() {
        let q = Select::new("S.E")
            .with_where(vec![Token::path("x"), Token::op(Operator::Eq), Token::val(true)])
            .with_limit(Limit::new(Some(5), 0));
        let count = q.to_count();
        assert!(count.is_count());
        assert!(!q.is_count());
        assert_eq!(count.where_, q.where_);
        assert!(count.limit.is_none());
    }

    #[test]
    fn payload_bytes_render_as_base64() {
        let mut obj = DataValue::object();
        obj.as_object_mut()
            .unwrap()
            .insert("image".into(), DataValue::Binary(b"hello".to_vec()));
        assert_eq!(obj.to_json(), json!({ "image": "aGVsbG8=" }));
        assert_eq!(serde_json::to_value(&obj).unwrap(), json!({ "image": "aGVsbG8=" }));
    }

    #[test]
    fn payload_from_json_converts_nested_values() {
        let v: DataValue = json!({ "z": 1, "a": [true, null], "m": "s" }).into();
        assert_eq!(v.as_object().unwrap().len(), 3);
        assert_eq!(v.get("a").unwrap().as_array().unwrap()[1], DataValue::Null);
        assert_eq!(v.get("m").unwrap().as_str(), Some("s"));
    }
}

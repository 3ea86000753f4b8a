//! Tests for SELECT compilation and binding order.

mod common;
use common::*;

use oxide_query::prelude::*;
use oxide_query::query::{BindingSlot, Component};
use oxide_query::{MacroRegistry, raw};

#[test]
fn test_select_with_where() {
    let c = sqlite();
    let q = c
        .table("users")
        .select(["id", "name"])
        .where_("votes", ">", 100);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT "id", "name" FROM "users" WHERE "votes" > ?"#
    );
    assert_eq!(q.get_bindings(), vec![int(100)]);
}

#[test]
fn test_empty_select_list_is_star() {
    let c = sqlite();
    assert_eq!(
        c.table("users").to_sql().unwrap(),
        r#"SELECT * FROM "users""#
    );
}

#[test]
fn test_distinct_and_aliases() {
    let c = sqlite();
    let q = c.table("users as u").distinct().select(["u.email as mail"]);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT DISTINCT "u"."email" AS "mail" FROM "users" AS "u""#
    );
}

#[test]
fn test_bindings_follow_clause_order_not_call_order() {
    let c = sqlite();
    let q = c
        .table("users")
        .order_by_raw("CASE WHEN id = ? THEN 0 ELSE 1 END", vec![int(7)])
        .having_raw("COUNT(*) > ?", vec![int(2)])
        .where_eq("active", true)
        .join_where("posts", "posts.user_id", "=", 5)
        .select_raw("? AS flag", vec![int(9)]);
    assert_eq!(
        q.get_bindings(),
        vec![int(9), int(5), SqlValue::Bool(true), int(2), int(7)]
    );
    assert_eq!(q.raw_bindings().slot(BindingSlot::Join), &[int(5)]);
}

#[test]
fn test_clones_are_independent() {
    let c = sqlite();
    let base = c.table("users").where_eq("a", 1);
    let narrowed = base.clone().where_eq("b", 2);

    assert_eq!(base.get_bindings(), vec![int(1)]);
    assert_eq!(narrowed.get_bindings(), vec![int(1), int(2)]);
    assert_eq!(base.to_sql().unwrap(), r#"SELECT * FROM "users" WHERE "a" = ?"#);
}

#[test]
fn test_empty_in_list_matches_nothing() {
    let c = sqlite();
    let q = c.table("users").where_in("id", Vec::<i64>::new());
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users" WHERE 0 = 1"#);
    assert!(q.get_bindings().is_empty());

    let q = c.table("users").where_not_in("id", Vec::<i64>::new());
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users" WHERE 1 = 1"#);
}

#[test]
fn test_where_in_binds_each_value() {
    let c = sqlite();
    let q = c.table("users").where_in("id", [1, 2, 3]);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "id" IN (?, ?, ?)"#
    );
    assert_eq!(q.get_bindings(), vec![int(1), int(2), int(3)]);
}

#[test]
fn test_empty_nested_group_is_dropped() {
    let c = sqlite();
    let q = c.table("users").where_eq("a", 1).where_nested(|q| q);
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users" WHERE "a" = ?"#);
}

#[test]
fn test_nested_group_with_or() {
    let c = sqlite();
    let q = c
        .table("users")
        .where_eq("a", 1)
        .or_where_nested(|q| q.where_eq("b", 2).where_eq("c", 3));
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "a" = ? OR ("b" = ? AND "c" = ?)"#
    );
    assert_eq!(q.get_bindings(), vec![int(1), int(2), int(3)]);
}

#[test]
fn test_null_value_becomes_is_null() {
    let c = sqlite();
    let q = c
        .table("users")
        .where_("deleted_at", "=", SqlValue::Null)
        .where_("banned_at", "<>", SqlValue::Null);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "deleted_at" IS NULL AND "banned_at" IS NOT NULL"#
    );
    assert!(q.get_bindings().is_empty());
}

#[test]
fn test_null_with_ordering_operator_is_rejected() {
    let c = sqlite();
    let q = c.table("users").where_("votes", ">", SqlValue::Null);
    assert!(matches!(q.to_sql(), Err(Error::InvalidArgument(_))));
    assert!(q.get().is_err());
    assert!(c.statements().is_empty());
}

#[test]
fn test_unknown_operator_is_taken_as_value() {
    let c = sqlite();
    let q = c.table("users").where_("name", "John", SqlValue::Null);
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users" WHERE "name" = ?"#);
    assert_eq!(q.get_bindings(), vec![text("John")]);
}

#[test]
fn test_operators_are_case_insensitive() {
    let c = sqlite();
    let q = c.table("users").where_("name", "LIKE", "J%");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "name" LIKE ?"#
    );
}

#[test]
fn test_raw_values_are_not_bound() {
    let c = sqlite();
    let q = c.table("users").where_("updated_at", ">", raw("created_at"));
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "updated_at" > created_at"#
    );
    assert!(q.get_bindings().is_empty());
}

#[test]
fn test_where_exists_with_closure() {
    let c = sqlite();
    let q = c.table("users").where_exists(|q| {
        q.from("posts")
            .where_column("posts.user_id", "=", "users.id")
            .where_eq("posts.published", 1)
    });
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE EXISTS (SELECT * FROM "posts" WHERE "posts"."user_id" = "users"."id" AND "posts"."published" = ?)"#
    );
    assert_eq!(q.get_bindings(), vec![int(1)]);
}

#[test]
fn test_where_in_subquery() {
    let c = sqlite();
    let posts = c.table("posts").select(["user_id"]).where_eq("published", 1);
    let q = c.table("users").where_eq("active", 1).where_in_sub("id", posts);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "active" = ? AND "id" IN (SELECT "user_id" FROM "posts" WHERE "published" = ?)"#
    );
    assert_eq!(q.get_bindings(), vec![int(1), int(1)]);
}

#[test]
fn test_join_sub_bindings_precede_where() {
    let c = sqlite();
    let latest = c.table("posts").where_eq("x", 1);
    let q = c
        .table("users")
        .where_eq("y", 2)
        .join_sub(latest, "p", "p.user_id", "=", "users.id");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" INNER JOIN (SELECT * FROM "posts" WHERE "x" = ?) AS "p" ON "p"."user_id" = "users"."id" WHERE "y" = ?"#
    );
    assert_eq!(q.get_bindings(), vec![int(1), int(2)]);
}

#[test]
fn test_join_with_closure_mixes_columns_and_values() {
    let c = sqlite();
    let q = c.table("users").left_join_on("contacts", |j| {
        j.on("users.id", "=", "contacts.user_id")
            .where_("contacts.kind", "=", "email")
    });
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "users" LEFT JOIN "contacts" ON "users"."id" = "contacts"."user_id" AND "contacts"."kind" = ?"#
    );
    assert_eq!(q.get_bindings(), vec![text("email")]);
}

#[test]
fn test_cross_join_has_no_constraint() {
    let c = sqlite();
    let q = c.table("sizes").cross_join("colors");
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "sizes" CROSS JOIN "colors""#
    );
}

#[test]
fn test_group_having_order_limit_offset() {
    let c = sqlite();
    let q = c
        .table("employees")
        .select(["department"])
        .select_raw("COUNT(*) AS total", vec![])
        .group_by(["department"])
        .having("total", ">", 2)
        .order_by_desc("total")
        .limit(10)
        .offset(20);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT "department", COUNT(*) AS total FROM "employees" GROUP BY "department" HAVING "total" > ? ORDER BY "total" DESC LIMIT 10 OFFSET 20"#
    );
}

#[test]
fn test_negative_limit_is_ignored_and_offset_clamped() {
    let c = sqlite();
    let q = c.table("users").limit(-5).offset(-3);
    assert_eq!(q.state().limit, None);
    assert_eq!(q.state().offset, Some(0));
}

#[test]
fn test_for_page_computes_offset() {
    let c = sqlite();
    let q = c.table("users").for_page(3, 15);
    assert_eq!(q.state().offset, Some(30));
    assert_eq!(q.state().limit, Some(15));
}

#[test]
fn test_reorder_drops_orders_and_their_bindings() {
    let c = sqlite();
    let q = c
        .table("users")
        .order_by_raw("FIELD(id, ?)", vec![int(1)])
        .order_by("name", Direction::Asc)
        .reorder();
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users""#);
    assert!(q.get_bindings().is_empty());
}

#[test]
fn test_union_applies_later_orders_to_the_union() {
    let c = sqlite();
    let first = c.table("users").where_eq("a", 1);
    let q = c
        .table("admins")
        .where_eq("b", 2)
        .union(first)
        .order_by("name", Direction::Asc)
        .limit(5);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM (SELECT * FROM "admins" WHERE "b" = ?) UNION SELECT * FROM (SELECT * FROM "users" WHERE "a" = ?) ORDER BY "name" ASC LIMIT 5"#
    );
    assert_eq!(q.get_bindings(), vec![int(2), int(1)]);
    assert!(q.state().orders.is_empty());
}

#[test]
fn test_date_wheres_pad_day_and_month() {
    let c = sqlite();
    let q = c
        .table("events")
        .where_day("starts_at", "=", 5)
        .where_month("starts_at", "=", 3)
        .where_year("starts_at", "=", 2024);
    assert_eq!(
        q.to_sql().unwrap(),
        r#"SELECT * FROM "events" WHERE strftime('%d', "starts_at") = CAST(? AS TEXT) AND strftime('%m', "starts_at") = CAST(? AS TEXT) AND strftime('%Y', "starts_at") = CAST(? AS TEXT)"#
    );
    assert_eq!(q.get_bindings(), vec![text("05"), text("03"), int(2024)]);
}

#[test]
fn test_clone_without_resets_components_only_on_the_copy() {
    let c = sqlite();
    let q = c
        .table("users")
        .select_raw("? AS x", vec![int(1)])
        .order_by("id", Direction::Asc)
        .limit(3);
    let bare = q
        .clone_without(&[Component::Columns, Component::Orders, Component::Limit])
        .clone_without_bindings(&[BindingSlot::Select]);
    assert_eq!(bare.to_sql().unwrap(), r#"SELECT * FROM "users""#);
    assert!(bare.get_bindings().is_empty());
    assert_eq!(q.state().limit, Some(3));
}

#[test]
fn test_invalid_binding_slot_name() {
    assert!(matches!(
        "nope".parse::<BindingSlot>(),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_when_applies_conditionally() {
    let c = sqlite();
    let q = c
        .table("users")
        .when(true, |q| q.where_eq("a", 1))
        .when(false, |q| q.where_eq("b", 2));
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users" WHERE "a" = ?"#);
}

#[test]
fn test_to_raw_sql_inlines_bindings() {
    let c = sqlite();
    let q = c.table("users").where_eq("name", "O'Brien").where_eq("id", 3);
    assert_eq!(
        q.to_raw_sql().unwrap(),
        r#"SELECT * FROM "users" WHERE "name" = 'O''Brien' AND "id" = 3"#
    );
}

#[test]
fn test_registered_macro_is_applied() {
    let mut macros = MacroRegistry::new();
    macros.register("active", |q, _args| q.where_eq("active", 1));
    let c = sqlite().with_macros(macros);

    let q = c.table("users").call_macro("active", &[]).unwrap();
    assert_eq!(q.to_sql().unwrap(), r#"SELECT * FROM "users" WHERE "active" = ?"#);

    let missing = c.table("users").call_macro("missing", &[]);
    assert!(matches!(missing, Err(Error::UndefinedMethod(name)) if name == "missing"));
}

#[test]
fn test_macro_without_registry_is_undefined() {
    let c = sqlite();
    assert!(matches!(
        c.table("users").call_macro("active", &[]),
        Err(Error::UndefinedMethod(_))
    ));
}

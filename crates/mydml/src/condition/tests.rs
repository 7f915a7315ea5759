use super::*;
use crate::builder::writer::Built;

fn render(conditions: &[Condition]) -> DmlResult<Built> {
    let mut w = SqlWriter::new(false);
    write_conditions(&mut w, conditions)?;
    Ok(w.finish())
}

fn sql(conditions: &[Condition]) -> String {
    render(conditions).unwrap().sql().to_string()
}

#[test]
fn literal_operands_are_inlined() {
    assert_eq!(sql(&[column("a").greater().int64(2)]), "(`a` > 2)");
    assert_eq!(
        sql(&[column("columnA").less_or_equal().float64(2.4)]),
        "(`columnA` <= 2.4)"
    );
    assert_eq!(
        sql(&[column("path").like().str("web/%")]),
        "(`path` LIKE 'web/%')"
    );
}

#[test]
fn conditions_join_with_and_or_and_parentheses() {
    let out = sql(&[
        column("a").int64(1),
        paren_open(),
        column("b").int64(2),
        column("c").int64(3).or(),
        paren_close(),
        column("d").not_null().or(),
    ]);
    assert_eq!(
        out,
        "(`a` = 1) AND ((`b` = 2) OR (`c` = 3)) OR (`d` IS NOT NULL)"
    );
}

#[test]
fn unbalanced_parentheses_are_rejected() {
    assert!(render(&[paren_open(), column("a").int64(1)]).unwrap_err().is_not_valid());
    assert!(render(&[paren_close()]).unwrap_err().is_not_valid());
}

#[test]
fn null_handling() {
    assert_eq!(sql(&[column("a").null()]), "(`a` IS NULL)");
    assert_eq!(sql(&[column("a").null_int64(None)]), "(`a` IS NULL)");
    assert_eq!(
        sql(&[column("a").not_equal().null_str(None)]),
        "(`a` IS NOT NULL)"
    );
    assert_eq!(sql(&[column("a").null_int64(Some(4))]), "(`a` = 4)");
}

#[test]
fn in_with_literals_and_placeholders() {
    assert_eq!(
        sql(&[column("id").in_().int64s(&[1, 2, 3])]),
        "(`id` IN (1,2,3))"
    );
    assert_eq!(
        sql(&[column("code").not_in().strs(&["a", "b"])]),
        "(`code` NOT IN ('a','b'))"
    );

    let built = render(&[column("config_id").in_().placeholder()]).unwrap();
    assert_eq!(built.sql(), "(`config_id` IN (?))");
    assert_eq!(built.qualified_columns(), vec![Some("config_id")]);

    let built = render(&[column("id").in_().placeholders(3)]).unwrap();
    assert_eq!(built.sql(), "(`id` IN (?,?,?))");
    assert_eq!(built.placeholders().len(), 3);
}

#[test]
fn in_with_empty_list_is_not_valid() {
    let err = render(&[column("id").in_().int64s(&[])]).unwrap_err();
    assert!(err.is_not_valid());
}

#[test]
fn between_requires_two_operands() {
    assert_eq!(
        sql(&[column("qty").between().int64s(&[3, 7])]),
        "(`qty` BETWEEN 3 AND 7)"
    );
    assert_eq!(
        sql(&[column("qty").not_between().placeholders(2)]),
        "(`qty` NOT BETWEEN ? AND ?)"
    );
    let err = render(&[column("qty").between().int64s(&[3])]).unwrap_err();
    assert!(err.is_not_valid());
    let err = render(&[column("qty").between().placeholders(3)]).unwrap_err();
    assert!(err.is_not_valid());
}

#[test]
fn tuples_render_one_group() {
    let built = render(&[columns(["entity_id", "store_id"]).in_().tuples()]).unwrap();
    assert_eq!(built.sql(), "((`entity_id`,`store_id`) IN ((?,?)))");
    assert_eq!(built.placeholders().len(), 1);
    assert_eq!(built.placeholders()[0].tuple, 2);

    let err = render(&[column("a").in_().tuples()]).unwrap_err();
    assert!(err.is_not_valid());
}

#[test]
fn column_expression_and_sub_select_operands() {
    assert_eq!(
        sql(&[column("t.parent_id").equal().column("p.entity_id")]),
        "(`t`.`parent_id` = `p`.`entity_id`)"
    );
    assert_eq!(
        sql(&[expr("`qty` > `min_qty`")]),
        "(`qty` > `min_qty`)"
    );
    let sub = Select::new(["entity_id"]).from("catalog_product_entity");
    assert_eq!(
        sql(&[column("product_id").in_().sub(sub.clone())]),
        "(`product_id` IN (SELECT `entity_id` FROM `catalog_product_entity`))"
    );
    assert_eq!(
        sql(&[exists(sub)]),
        "(EXISTS (SELECT `entity_id` FROM `catalog_product_entity`))"
    );
}

#[test]
fn greatest_and_space_ship() {
    assert_eq!(
        sql(&[column("a").greatest().int64s(&[1, 2])]),
        "(`a` = GREATEST(1,2))"
    );
    assert_eq!(
        sql(&[column("a").space_ship().null_int64(Some(1))]),
        "(`a` <=> 1)"
    );
}

#[test]
fn missing_operand_is_not_valid() {
    let err = render(&[column("a").greater()]).unwrap_err();
    assert!(err.is_not_valid());
}

#[test]
fn raw_expression_placeholders_are_recorded() {
    let built = render(&[expr("`a` = ? OR `b` = ?")]).unwrap();
    assert_eq!(built.placeholders().len(), 2);
}

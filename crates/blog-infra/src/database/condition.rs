//! Translation of the query model into SeaORM conditions.
//!
//! Columns are always qualified with their table because filters on author
//! fields join `users`, which shares column names with `posts`.

use sea_orm::sea_query::{Expr, Func, IntoColumnRef, LikeExpr, SimpleExpr};
use sea_orm::{Condition, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select};

use blog_core::error::RepoError;
use blog_core::query::{
    Comparison, Condition as Test, DatePart, Lookup, OrderBy, PostField, PostQuery, Q, Value,
};

use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};

fn column(field: PostField) -> SimpleExpr {
    let column = match field {
        PostField::Id => (PostEntity, post::Column::Id).into_column_ref(),
        PostField::Title => (PostEntity, post::Column::Title).into_column_ref(),
        PostField::Slug => (PostEntity, post::Column::Slug).into_column_ref(),
        PostField::Body => (PostEntity, post::Column::Body).into_column_ref(),
        PostField::Publish => (PostEntity, post::Column::Publish).into_column_ref(),
        PostField::Created => (PostEntity, post::Column::Created).into_column_ref(),
        PostField::Updated => (PostEntity, post::Column::Updated).into_column_ref(),
        PostField::Status => (PostEntity, post::Column::Status).into_column_ref(),
        PostField::Author => (PostEntity, post::Column::AuthorId).into_column_ref(),
        PostField::AuthorUsername => (UserEntity, user::Column::Username).into_column_ref(),
        PostField::AuthorEmail => (UserEntity, user::Column::Email).into_column_ref(),
    };
    SimpleExpr::Column(column)
}

fn lower(field: PostField) -> Expr {
    Expr::expr(Func::lower(column(field)))
}

fn scalar(value: &Value) -> Result<sea_orm::Value, RepoError> {
    Ok(match value {
        Value::Int(v) => (*v).into(),
        Value::Text(v) => v.clone().into(),
        Value::Timestamp(v) => (*v).into(),
        Value::Date(v) => (*v).into(),
        Value::Uuid(v) => (*v).into(),
        Value::Status(v) => v.code().into(),
        other => {
            return Err(RepoError::InvalidQuery(format!(
                "expected a single value, got {other:?}"
            )));
        }
    })
}

fn text(value: &Value) -> Result<&str, RepoError> {
    match value {
        Value::Text(v) => Ok(v),
        other => Err(RepoError::InvalidQuery(format!(
            "expected text, got {other:?}"
        ))),
    }
}

fn list(value: &Value) -> Result<Vec<sea_orm::Value>, RepoError> {
    match value {
        Value::List(items) => items.iter().map(scalar).collect(),
        other => Err(RepoError::InvalidQuery(format!(
            "expected a list, got {other:?}"
        ))),
    }
}

/// `LIKE` pattern with the wildcard characters of `raw` escaped.
fn like(prefix: &str, raw: &str, suffix: &str) -> LikeExpr {
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    LikeExpr::new(format!("{prefix}{escaped}{suffix}")).escape('\\')
}

/// Component of a timestamp column, computed in UTC.
fn date_part(field: PostField, part: DatePart) -> SimpleExpr {
    let sql = match part {
        DatePart::Date => "($1 AT TIME ZONE 'UTC')::date",
        DatePart::Year => "EXTRACT(YEAR FROM $1 AT TIME ZONE 'UTC')",
        DatePart::Month => "EXTRACT(MONTH FROM $1 AT TIME ZONE 'UTC')",
        DatePart::Day => "EXTRACT(DAY FROM $1 AT TIME ZONE 'UTC')",
        // PostgreSQL counts from 0 = Sunday; week days here run 1 = Sunday to 7.
        DatePart::WeekDay => "(EXTRACT(DOW FROM $1 AT TIME ZONE 'UTC') + 1)",
    };
    Expr::cust_with_exprs(sql, [column(field)])
}

fn compare(lhs: SimpleExpr, cmp: Comparison, value: &Value) -> Result<SimpleExpr, RepoError> {
    let lhs = Expr::expr(lhs);
    Ok(match cmp {
        Comparison::Exact => lhs.eq(scalar(value)?),
        Comparison::Gt => lhs.gt(scalar(value)?),
        Comparison::Gte => lhs.gte(scalar(value)?),
        Comparison::Lt => lhs.lt(scalar(value)?),
        Comparison::Lte => lhs.lte(scalar(value)?),
        Comparison::In => lhs.is_in(list(value)?),
        Comparison::Range => match value {
            Value::Range(lo, hi) => lhs.between(scalar(lo)?, scalar(hi)?),
            other => {
                return Err(RepoError::InvalidQuery(format!(
                    "expected a range, got {other:?}"
                )));
            }
        },
    })
}

fn test_expr(test: &Test) -> Result<SimpleExpr, RepoError> {
    let field = test.field;
    let value = &test.value;

    Ok(match test.lookup {
        Lookup::Exact => compare(column(field), Comparison::Exact, value)?,
        Lookup::Gt => compare(column(field), Comparison::Gt, value)?,
        Lookup::Gte => compare(column(field), Comparison::Gte, value)?,
        Lookup::Lt => compare(column(field), Comparison::Lt, value)?,
        Lookup::Lte => compare(column(field), Comparison::Lte, value)?,
        Lookup::In => compare(column(field), Comparison::In, value)?,
        Lookup::Range => compare(column(field), Comparison::Range, value)?,
        Lookup::NotIn => Expr::expr(column(field)).is_not_in(list(value)?),
        Lookup::IExact => lower(field).eq(text(value)?.to_lowercase()),
        Lookup::Contains => Expr::expr(column(field)).like(like("%", text(value)?, "%")),
        Lookup::IContains => lower(field).like(like("%", &text(value)?.to_lowercase(), "%")),
        Lookup::StartsWith => Expr::expr(column(field)).like(like("", text(value)?, "%")),
        Lookup::IStartsWith => lower(field).like(like("", &text(value)?.to_lowercase(), "%")),
        Lookup::EndsWith => Expr::expr(column(field)).like(like("%", text(value)?, "")),
        Lookup::IEndsWith => lower(field).like(like("%", &text(value)?.to_lowercase(), "")),
        Lookup::Regex => Expr::cust_with_exprs(
            "$1 ~ $2",
            [column(field), Expr::val(text(value)?).into()],
        ),
        Lookup::IRegex => Expr::cust_with_exprs(
            "$1 ~* $2",
            [column(field), Expr::val(text(value)?).into()],
        ),
        Lookup::IsNull => match value {
            Value::Bool(true) => Expr::expr(column(field)).is_null(),
            Value::Bool(false) => Expr::expr(column(field)).is_not_null(),
            other => {
                return Err(RepoError::InvalidQuery(format!(
                    "isnull expects a boolean, got {other:?}"
                )));
            }
        },
        Lookup::Part(part, cmp) => compare(date_part(field, part), cmp, value)?,
    })
}

fn never() -> Condition {
    Condition::all().add(Expr::cust("FALSE"))
}

/// Translate a filter tree into a SeaORM condition.
pub(crate) fn to_condition(q: &Q) -> Result<Condition, RepoError> {
    Ok(match q {
        Q::All => Condition::all(),
        Q::Condition(test) => Condition::all().add(test_expr(test)?),
        Q::And(parts) => parts
            .iter()
            .try_fold(Condition::all(), |acc, q| Ok::<_, RepoError>(acc.add(to_condition(q)?)))?,
        Q::Or(parts) if parts.is_empty() => never(),
        Q::Or(parts) => parts
            .iter()
            .try_fold(Condition::any(), |acc, q| Ok::<_, RepoError>(acc.add(to_condition(q)?)))?,
        // a ^ b ^ c holds when an odd number of operands hold.
        Q::Xor(parts) => {
            let mut iter = parts.iter();
            let Some(first) = iter.next() else {
                return Ok(never());
            };
            iter.try_fold(to_condition(first)?, |acc, q| {
                let next = to_condition(q)?;
                // Both sides are nested so an `any` operand never absorbs the other.
                Ok::<_, RepoError>(
                    Condition::any()
                        .add(Condition::all().add(acc.clone()).add(next.clone().not()))
                        .add(Condition::all().add(acc.not()).add(next)),
                )
            })?
        }
        Q::Not(inner) if matches!(**inner, Q::All) => never(),
        Q::Not(inner) => Condition::all().add(to_condition(inner)?.not()),
    })
}

/// Posts matching the filter of `query`, joined with their author when needed.
pub(crate) fn select_matching(query: &PostQuery) -> Result<Select<PostEntity>, RepoError> {
    query.validate()?;
    let mut select = PostEntity::find();
    if query.uses_related() {
        select = select.inner_join(UserEntity);
    }
    if matches!(query.filter, Q::All) {
        return Ok(select);
    }
    Ok(select.filter(to_condition(&query.filter)?))
}

/// Posts selected by `query`: filtered, ordered and windowed.
pub(crate) fn select_window(query: &PostQuery) -> Result<Select<PostEntity>, RepoError> {
    let mut select = select_matching(query)?;
    for order in query.effective_ordering() {
        select = match *order {
            OrderBy::Asc(field) => select.order_by(column(field), Order::Asc),
            OrderBy::Desc(field) => select.order_by(column(field), Order::Desc),
            OrderBy::Random => select.order_by(Expr::cust("RANDOM()"), Order::Asc),
        };
    }
    // Ties fall back to insertion order.
    select = select.order_by(column(PostField::Id), Order::Asc);

    if query.offset > 0 {
        select = select.offset(query.offset);
    }
    if let Some(limit) = query.limit {
        select = select.limit(limit);
    }
    Ok(select)
}

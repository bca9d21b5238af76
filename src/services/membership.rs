//! Channel/course membership bookkeeping.
//!
//! Both `Channel.courses` and `Course.channels` are read from the single
//! `channel_courses` table, so keeping them in step means applying one diff
//! to that table inside a transaction.

use std::collections::{BTreeSet, HashMap};

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::models::ChannelCourse;
use crate::db::schema::channel_courses;
use crate::error::AppResult;

/// Which side of the relation is being edited.
#[derive(Debug, Clone, Copy)]
pub enum Owner {
    Channel(Uuid),
    Course(Uuid),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Duplicates in `desired` collapse; output is sorted.
pub fn diff(current: &[Uuid], desired: &[Uuid]) -> MembershipDiff {
    let current: BTreeSet<Uuid> = current.iter().copied().collect();
    let desired: BTreeSet<Uuid> = desired.iter().copied().collect();

    MembershipDiff {
        added: desired.difference(&current).copied().collect(),
        removed: current.difference(&desired).copied().collect(),
    }
}

fn pair(owner: Owner, other: Uuid) -> ChannelCourse {
    match owner {
        Owner::Channel(channel_id) => ChannelCourse {
            channel_id,
            course_id: other,
        },
        Owner::Course(course_id) => ChannelCourse {
            channel_id: other,
            course_id,
        },
    }
}

/// Ids on the other side of the relation.
pub async fn linked(conn: &mut AsyncPgConnection, owner: Owner) -> AppResult<Vec<Uuid>> {
    let ids = match owner {
        Owner::Channel(id) => {
            channel_courses::table
                .filter(channel_courses::channel_id.eq(id))
                .select(channel_courses::course_id)
                .load::<Uuid>(conn)
                .await?
        }
        Owner::Course(id) => {
            channel_courses::table
                .filter(channel_courses::course_id.eq(id))
                .select(channel_courses::channel_id)
                .load::<Uuid>(conn)
                .await?
        }
    };
    Ok(ids)
}

/// Batch version of [`linked`] for list endpoints.
pub async fn linked_many(
    conn: &mut AsyncPgConnection,
    owners: Vec<Uuid>,
    channel_side: bool,
) -> AppResult<HashMap<Uuid, Vec<Uuid>>> {
    let rows = if channel_side {
        channel_courses::table
            .filter(channel_courses::channel_id.eq_any(owners))
            .select(ChannelCourse::as_select())
            .load::<ChannelCourse>(conn)
            .await?
    } else {
        channel_courses::table
            .filter(channel_courses::course_id.eq_any(owners))
            .select(ChannelCourse::as_select())
            .load::<ChannelCourse>(conn)
            .await?
    };

    let mut grouped: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in rows {
        let (key, value) = if channel_side {
            (row.channel_id, row.course_id)
        } else {
            (row.course_id, row.channel_id)
        };
        grouped.entry(key).or_default().push(value);
    }
    Ok(grouped)
}

/// Replaces the owner's links with `desired`. Run it inside a transaction.
pub async fn sync(
    conn: &mut AsyncPgConnection,
    owner: Owner,
    desired: &[Uuid],
) -> AppResult<MembershipDiff> {
    let current = linked(conn, owner).await?;
    let changes = diff(&current, desired);

    if !changes.removed.is_empty() {
        let removed = changes.removed.clone();
        match owner {
            Owner::Channel(id) => {
                diesel::delete(
                    channel_courses::table
                        .filter(channel_courses::channel_id.eq(id))
                        .filter(channel_courses::course_id.eq_any(removed)),
                )
                .execute(conn)
                .await?;
            }
            Owner::Course(id) => {
                diesel::delete(
                    channel_courses::table
                        .filter(channel_courses::course_id.eq(id))
                        .filter(channel_courses::channel_id.eq_any(removed)),
                )
                .execute(conn)
                .await?;
            }
        }
    }

    if !changes.added.is_empty() {
        let rows: Vec<ChannelCourse> = changes.added.iter().map(|&id| pair(owner, id)).collect();
        diesel::insert_into(channel_courses::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(conn)
            .await?;
    }

    if !changes.is_empty() {
        log::debug!(
            "Membership of {:?}: +{} -{}",
            owner,
            changes.added.len(),
            changes.removed.len()
        );
    }
    Ok(changes)
}

/// Pulls every link of `owner`.
pub async fn detach_all(conn: &mut AsyncPgConnection, owner: Owner) -> AppResult<usize> {
    let removed = match owner {
        Owner::Channel(id) => {
            diesel::delete(channel_courses::table.filter(channel_courses::channel_id.eq(id)))
                .execute(conn)
                .await?
        }
        Owner::Course(id) => {
            diesel::delete(channel_courses::table.filter(channel_courses::course_id.eq(id)))
                .execute(conn)
                .await?
        }
    };
    Ok(removed)
}

use chrono::{Duration, NaiveDate, Utc};
use nexushub_core::db::open_db_in_memory;
use nexushub_core::domain::{
    ActivityRepository, ActivityTarget, CommentRepository, CompanyRepository, ContactRepository,
    CustomFieldRepository, DealRepository, NotificationRepository, ProjectRepository, TaskRepository, TeamRepository,
};
use nexushub_core::model::record::now_epoch_ms;
use nexushub_core::{
    fields, BulkFailureKind, FieldValue, ListFilter, Pagination, RecordRepository, TenantId,
};
use uuid::Uuid;

fn new_tenant() -> TenantId {
    TenantId::new(Uuid::new_v4())
}

#[test]
fn company_subsidiaries_and_status_counts() {
    let conn = open_db_in_memory().unwrap();
    let repo = CompanyRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();

    let parent = repo
        .records()
        .create(tenant, fields! { "name" => "Holding" })
        .unwrap();
    let child = repo
        .records()
        .create(
            tenant,
            fields! { "name" => "Child", "status" => "lead", "parent_company_id" => parent.id },
        )
        .unwrap();
    let deleted_child = repo
        .records()
        .create(tenant, fields! { "name" => "Gone", "parent_company_id" => parent.id })
        .unwrap();
    repo.records().soft_delete(tenant, deleted_child.id).unwrap();

    let subsidiaries = repo.subsidiaries(tenant, parent.id).unwrap();
    assert_eq!(subsidiaries.len(), 1);
    assert_eq!(subsidiaries[0].id, child.id);

    assert_eq!(repo.count_by_status(tenant, Some("lead")).unwrap(), 1);
    assert_eq!(repo.count_by_status(tenant, None).unwrap(), 2);
}

#[test]
fn contact_duplicates_match_email_or_phone_once() {
    let conn = open_db_in_memory().unwrap();
    let repo = ContactRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();

    let by_email = repo
        .records()
        .create(
            tenant,
            fields! {
                "first_name" => "Ada",
                "last_name" => "Lovelace",
                "email" => "ada@example.com",
                "phone" => "+44 1",
            },
        )
        .unwrap();
    let by_phone = repo
        .records()
        .create(
            tenant,
            fields! { "first_name" => "Ada", "last_name" => "King", "phone" => "+44 1" },
        )
        .unwrap();

    let found = repo.find_by_email(tenant, " ada@example.com ").unwrap();
    assert_eq!(found.map(|record| record.id), Some(by_email.id));
    assert!(repo.find_by_email(tenant, "nobody@example.com").unwrap().is_none());

    let duplicates = repo
        .find_duplicates(tenant, Some("ada@example.com"), Some("+44 1"))
        .unwrap();
    let ids: Vec<_> = duplicates.iter().map(|record| record.id).collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], by_email.id);
    assert!(ids.contains(&by_phone.id));

    assert!(repo.find_duplicates(tenant, None, Some("  ")).unwrap().is_empty());
}

#[test]
fn deal_stage_moves_update_status_and_probability() {
    let conn = open_db_in_memory().unwrap();
    let repo = DealRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();

    let deal = repo
        .records()
        .create(
            tenant,
            fields! {
                "name" => "Expansion",
                "company_id" => Uuid::new_v4(),
                "value" => 10_000_i64,
                "probability" => 60_i64,
            },
        )
        .unwrap();
    assert_eq!(deal.text("stage"), Some("lead"));

    let won = repo.move_stage(tenant, deal.id, "closed_won").unwrap();
    assert_eq!(won.text("status"), Some("won"));
    assert_eq!(won.get("probability"), Some(&FieldValue::Integer(100)));
    assert_eq!(
        won.get("actual_close_date"),
        Some(&FieldValue::Date(Utc::now().date_naive()))
    );
    assert!(won.get("stage_changed_at").is_some());

    let reopened = repo.move_stage(tenant, deal.id, "negotiation").unwrap();
    assert_eq!(reopened.text("status"), Some("open"));
    assert!(reopened.get("actual_close_date").is_none());

    assert!(repo.move_stage(tenant, deal.id, "celebrating").is_err());
}

#[test]
fn deal_pipeline_and_forecast_cover_open_deals() {
    let conn = open_db_in_memory().unwrap();
    let repo = DealRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let owner = Uuid::new_v4();
    let company = Uuid::new_v4();

    for (stage, value, probability, owner_id) in [
        ("lead", 1_000_i64, 10_i64, Some(owner)),
        ("lead", 3_000, 30, None),
        ("proposal", 5_000, 50, Some(owner)),
    ] {
        repo.records()
            .create(
                tenant,
                fields! {
                    "name" => format!("{stage}-{value}"),
                    "company_id" => company,
                    "stage" => stage,
                    "value" => value,
                    "probability" => probability,
                    "owner_id" => owner_id,
                },
            )
            .unwrap();
    }
    let closed = repo
        .records()
        .create(
            tenant,
            fields! { "name" => "Closed", "company_id" => company, "value" => 99_000_i64 },
        )
        .unwrap();
    repo.move_stage(tenant, closed.id, "closed_lost").unwrap();

    let summary = repo.pipeline_summary(tenant).unwrap();
    let stages: Vec<_> = summary.iter().map(|entry| entry.stage.as_str()).collect();
    assert_eq!(stages, vec!["lead", "proposal"]);
    assert_eq!(summary[0].count, 2);
    assert_eq!(summary[0].total_value, 4_000.0);
    assert_eq!(summary[0].avg_probability, 20.0);
    assert_eq!(summary[0].total_expected, 1_000.0);

    let all = repo.forecast(tenant, None).unwrap();
    assert_eq!(all.deal_count, 3);
    assert_eq!(all.total_forecast, 3_500.0);

    let mine = repo.forecast(tenant, Some(owner)).unwrap();
    assert_eq!(mine.deal_count, 2);
    assert_eq!(mine.total_forecast, 2_600.0);
}

#[test]
fn activity_upcoming_overdue_and_timeline() {
    let conn = open_db_in_memory().unwrap();
    let repo = ActivityRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let user = Uuid::new_v4();
    let company = Uuid::new_v4();
    let now = now_epoch_ms();
    let hour = 3_600_000_i64;

    let create = |subject: &str, status: &str, at: i64| {
        repo.records()
            .create(
                tenant,
                fields! {
                    "type" => "call",
                    "subject" => subject,
                    "status" => status,
                    "user_id" => user,
                    "company_id" => company,
                    "activity_date" => FieldValue::DateTime(at),
                },
            )
            .unwrap()
    };
    let later = create("later", "planned", now + 2 * hour);
    let soon = create("soon", "planned", now + hour);
    let missed = create("missed", "planned", now - hour);
    let done = create("done", "completed", now - 2 * hour);

    let upcoming = repo.upcoming(tenant, now, 10).unwrap();
    let upcoming_ids: Vec<_> = upcoming.iter().map(|record| record.id).collect();
    assert_eq!(upcoming_ids, vec![soon.id, later.id]);
    assert_eq!(repo.upcoming(tenant, now, 1).unwrap().len(), 1);

    let overdue = repo.overdue(tenant, now).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, missed.id);

    let timeline = repo
        .timeline(tenant, ActivityTarget::Company(company), 3)
        .unwrap();
    let timeline_ids: Vec<_> = timeline.iter().map(|record| record.id).collect();
    assert_eq!(timeline_ids, vec![later.id, soon.id, missed.id]);
    assert!(!timeline_ids.contains(&done.id));
}

#[test]
fn project_queries_by_owner_and_status() {
    let conn = open_db_in_memory().unwrap();
    let repo = ProjectRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let owner = Uuid::new_v4();

    repo.records()
        .create(tenant, fields! { "name" => "Alpha", "owner_id" => owner })
        .unwrap();
    repo.records()
        .create(
            tenant,
            fields! { "name" => "Beta", "owner_id" => owner, "status" => "on_hold" },
        )
        .unwrap();
    repo.records()
        .create(tenant, fields! { "name" => "Gamma" })
        .unwrap();

    let owned = repo.by_owner(tenant, owner, Pagination::default()).unwrap();
    assert_eq!(owned.total_count, 2);

    let on_hold = repo.by_status(tenant, "on_hold", Pagination::default()).unwrap();
    assert_eq!(on_hold.items.len(), 1);
    assert_eq!(on_hold.items[0].text("name"), Some("Beta"));
    assert_eq!(on_hold.items[0].get("priority"), Some(&FieldValue::Integer(3)));
}

#[test]
fn task_subtasks_and_overdue() {
    let conn = open_db_in_memory().unwrap();
    let repo = TaskRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let project = Uuid::new_v4();
    let assignee = Uuid::new_v4();
    let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

    let parent = repo
        .records()
        .create(
            tenant,
            fields! {
                "title" => "Launch",
                "project_id" => project,
                "deadline" => today - Duration::days(3),
                "assignee_id" => assignee,
            },
        )
        .unwrap();
    let child = repo
        .records()
        .create(
            tenant,
            fields! {
                "title" => "Write docs",
                "project_id" => project,
                "parent_task_id" => parent.id,
                "deadline" => today - Duration::days(1),
                "status" => "done",
            },
        )
        .unwrap();
    repo.records()
        .create(
            tenant,
            fields! { "title" => "Due today", "project_id" => project, "deadline" => today },
        )
        .unwrap();

    let subtasks = repo.subtasks(tenant, parent.id).unwrap();
    assert_eq!(subtasks.len(), 1);
    assert_eq!(subtasks[0].id, child.id);

    let overdue = repo.overdue(tenant, today).unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, parent.id);

    let in_project = repo.by_project(tenant, project, Pagination::default()).unwrap();
    assert_eq!(in_project.total_count, 3);
    let assigned = repo.by_assignee(tenant, assignee, Pagination::default()).unwrap();
    assert_eq!(assigned.total_count, 1);
}

#[test]
fn task_external_ids_may_repeat_and_remain_filterable() {
    let conn = open_db_in_memory().unwrap();
    let repo = TaskRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let project = Uuid::new_v4();

    for title in ["One", "Two"] {
        repo.records()
            .create(
                tenant,
                fields! { "title" => title, "project_id" => project, "external_id" => "GH-1" },
            )
            .unwrap();
    }

    let linked = repo
        .records()
        .count(tenant, &ListFilter::new().eq("external_id", "GH-1"))
        .unwrap();
    assert_eq!(linked, 2);
}

#[test]
fn team_membership_lookup() {
    let conn = open_db_in_memory().unwrap();
    let repo = TeamRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();

    let team = repo
        .records()
        .create(
            tenant,
            fields! {
                "name" => "Platform",
                "owner_id" => owner,
                "member_ids" => FieldValue::tags([owner.to_string(), member.to_string()]),
            },
        )
        .unwrap();
    repo.records()
        .create(tenant, fields! { "name" => "Design", "owner_id" => owner })
        .unwrap();

    let teams = repo.for_member(tenant, member).unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].id, team.id);
    assert!(repo.for_member(tenant, Uuid::new_v4()).unwrap().is_empty());

    let owned = repo.by_owner(tenant, owner, Pagination::default()).unwrap();
    assert_eq!(owned.total_count, 2);
}

#[test]
fn notifications_mark_read_only_for_recipient() {
    let conn = open_db_in_memory().unwrap();
    let repo = NotificationRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let user = Uuid::new_v4();
    let someone_else = Uuid::new_v4();

    let notify = |recipient: Uuid, title: &str| {
        repo.records()
            .create(
                tenant,
                fields! {
                    "type" => "mention",
                    "title" => title,
                    "message" => "You were mentioned",
                    "user_id" => recipient,
                },
            )
            .unwrap()
            .id
    };
    let first = notify(user, "first");
    let second = notify(user, "second");
    let foreign = notify(someone_else, "not yours");

    assert_eq!(repo.unread_count(tenant, user).unwrap(), 2);

    let result = repo.mark_as_read(tenant, user, &[first, foreign]);
    assert_eq!(result.succeeded(), 1);
    let failures: Vec<_> = result.failures().collect();
    assert_eq!(failures[0].0, foreign);
    assert_eq!(failures[0].1.kind, BulkFailureKind::NotFound);

    assert_eq!(repo.unread_count(tenant, user).unwrap(), 1);
    assert_eq!(repo.unread_count(tenant, someone_else).unwrap(), 1);

    let unread = repo
        .for_user(tenant, user, true, Pagination::default())
        .unwrap();
    assert_eq!(unread.items.len(), 1);
    assert_eq!(unread.items[0].id, second);

    let read = repo.records().get(tenant, first, false).unwrap();
    assert!(read.get("read_at").is_some());
}

#[test]
fn comments_thread_top_level_and_replies() {
    let conn = open_db_in_memory().unwrap();
    let repo = CommentRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let task = Uuid::new_v4();
    let author = Uuid::new_v4();

    let comment = |content: &str, parent: Option<Uuid>| {
        repo.records()
            .create(
                tenant,
                fields! {
                    "content" => content,
                    "entity_type" => "task",
                    "entity_id" => task,
                    "author_id" => author,
                    "parent_id" => parent,
                },
            )
            .unwrap()
            .id
    };
    let root = comment("first!", None);
    let reply = comment("agreed", Some(root));
    let second_root = comment("another thought", None);

    let top_level = repo
        .for_entity(tenant, "task", task, Pagination::default())
        .unwrap();
    let ids: Vec<_> = top_level.items.iter().map(|record| record.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&root) && ids.contains(&second_root));
    assert!(!ids.contains(&reply));

    let replies = repo.replies(tenant, root, Pagination::default()).unwrap();
    assert_eq!(replies.items.len(), 1);
    assert_eq!(replies.items[0].id, reply);

    let authored = repo.by_author(tenant, author, Pagination::default()).unwrap();
    assert_eq!(authored.total_count, 3);
}

#[test]
fn custom_fields_are_unique_per_entity_type_and_ordered_by_position() {
    let conn = open_db_in_memory().unwrap();
    let repo = CustomFieldRepository::try_new(&conn).unwrap();
    let tenant = new_tenant();
    let define = |entity_type: &str, field_name: &str, position: i64| {
        repo.records().create(
            tenant,
            fields! {
                "entity_type" => entity_type,
                "field_name" => field_name,
                "field_label" => field_name.to_uppercase(),
                "field_type" => "text",
                "position" => position,
            },
        )
    };

    let region = define("company", "region", 2).unwrap();
    let tier = define("company", "tier", 1).unwrap();
    let contact_region = define("contact", "region", 0).unwrap();

    let err = define("company", "region", 5).unwrap_err();
    match err {
        nexushub_core::RepoError::Validation(validation) => {
            assert_eq!(validation.fields(), vec!["field_name"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let moved = repo.records().update(
        tenant,
        contact_region.id,
        fields! { "entity_type" => "company" },
    );
    assert!(matches!(moved, Err(nexushub_core::RepoError::Validation(_))));

    let archived = define("company", "legacy_code", 0).unwrap();
    repo.records()
        .update(tenant, archived.id, fields! { "is_active" => false })
        .unwrap();

    let active: Vec<_> = repo
        .by_entity_type(tenant, "company", true)
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(active, vec![tier.id, region.id]);

    let everything = repo.by_entity_type(tenant, "company", false).unwrap();
    assert_eq!(everything.len(), 3);
    assert_eq!(everything[0].id, archived.id);

    repo.records().soft_delete(tenant, region.id).unwrap();
    define("company", "region", 3).unwrap();
    assert!(repo.by_entity_type(new_tenant(), "company", false).unwrap().is_empty());
}

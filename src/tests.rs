#![cfg(test)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::db::{init_pool_at, run_migrations, seed_defaults, DbPool};
use crate::models::admin::Admin;
use crate::models::category::{Category, CategoryDelete, CategoryForm};
use crate::models::comment::{ApprovalPolicy, Comment, CommentForm};
use crate::models::dashboard::Dashboard;
use crate::models::post::{Post, PostFilter, PostForm, PostStatus, PostUpdate};
use crate::models::reaction::{Reaction, ReactionKind};
use crate::models::settings::{Setting, SiteConfig};
use crate::models::tag::Tag;
use crate::models::user::User;
use crate::security::auth;
use crate::security::role::{Capability, Role};

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Fresh in-memory SQLite pool with migrations and default settings applied.
/// Named shared-cache so every pooled connection sees the same data.
pub(crate) fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:quill_testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .expect("Failed to create test pool");
    run_migrations(&pool).expect("Failed to run migrations");
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

/// Registers a user the same way the register endpoint does (per-user salt, bcrypt).
pub(crate) fn make_user(pool: &DbPool, username: &str, password: &str) -> User {
    let salt = auth::generate_salt();
    let hash = auth::hash_password(password, &salt).unwrap();
    let id = User::create(pool, username, &format!("{}@example.com", username), &hash, &salt).unwrap();
    User::get_by_id(pool, id).unwrap().unwrap()
}

fn post_form(title: &str, status: Option<&str>, category_id: Option<i64>) -> PostForm {
    PostForm {
        title: title.to_string(),
        content: format!("Body of {}", title),
        category_id,
        featured_image: None,
        status: status.map(str::to_string),
        tags: None,
    }
}

fn make_post(pool: &DbPool, author: &User, title: &str, status: &str) -> Post {
    let id = Post::create(pool, author.id, &post_form(title, Some(status), None)).unwrap();
    Post::find_by_id(pool, id).unwrap().unwrap()
}

fn comment(pool: &DbPool, user: &User, post_id: i64, parent: Option<i64>, text: &str, approved: bool) -> i64 {
    let form = CommentForm {
        post_id,
        content: text.to_string(),
        parent_comment_id: parent,
    };
    Comment::create(pool, user.id, &form, approved).unwrap()
}

fn names(tags: &[Tag]) -> Vec<String> {
    let mut v: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
    v.sort();
    v
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_defaults_are_seeded() {
    let pool = test_pool();
    let config = SiteConfig::load(&pool);
    assert_eq!(config.site_name, "Quill");
    assert_eq!(config.posts_per_page, 10);
    assert_eq!(config.comment_policy, ApprovalPolicy::Auto);
    assert_eq!(config.uploads_max_bytes, 5 * 1024 * 1024);
    assert!(!config.secure_cookies);
}

#[test]
fn settings_seed_keeps_existing_values() {
    let pool = test_pool();
    Setting::set(&pool, "site_name", "My Blog").unwrap();
    seed_defaults(&pool).unwrap();
    assert_eq!(Setting::get_or(&pool, "site_name", "?"), "My Blog");
}

#[test]
fn settings_bad_values_fall_back() {
    let pool = test_pool();
    Setting::set(&pool, "comments_moderation", "sometimes").unwrap();
    Setting::set(&pool, "posts_per_page", "lots").unwrap();
    Setting::set(&pool, "site_url", "https://blog.example.com").unwrap();
    let config = SiteConfig::load(&pool);
    assert_eq!(config.comment_policy, ApprovalPolicy::Auto);
    assert_eq!(config.posts_per_page, 10);
    assert!(config.secure_cookies);
}

#[test]
fn settings_huge_values_are_clamped() {
    let pool = test_pool();
    Setting::set(&pool, "uploads_max_mb", "99999999999999").unwrap();
    Setting::set(&pool, "session_expiry_hours", &i64::MAX.to_string()).unwrap();
    Setting::set(&pool, "login_rate_limit", "-4").unwrap();
    let config = SiteConfig::load(&pool);
    assert_eq!(config.uploads_max_bytes, 1024 * 1024 * 1024);
    assert_eq!(config.session_expiry_hours, 8760);
    assert_eq!(config.login_rate_limit, 1);
    assert!(!config.trust_proxy_headers);

    let ada = make_user(&pool, "ada", "correct-horse");
    let session = auth::create_session(&pool, &ada, i64::MAX).unwrap();
    assert!(auth::session_user(&pool, &session).unwrap().is_some());
}

// ═══════════════════════════════════════════════════════════
// Users & sessions
// ═══════════════════════════════════════════════════════════

#[test]
fn user_create_stores_salt() {
    let pool = test_pool();
    let user = make_user(&pool, "ada", "lovelace1");
    let salt = User::salt_for(&pool, user.id).unwrap().unwrap();
    assert!(auth::verify_password("lovelace1", &salt, &user.password_hash));
    assert!(!auth::verify_password("lovelace1", "", &user.password_hash));
}

#[test]
fn user_duplicate_username_and_email_rejected() {
    let pool = test_pool();
    make_user(&pool, "ada", "lovelace1");
    assert!(User::username_taken(&pool, "ada").unwrap());

    let err = User::create(&pool, "ada", "other@example.com", "h", "s").unwrap_err();
    assert!(crate::error::is_unique_violation(&err));
    let err = User::create(&pool, "ada2", "ada@example.com", "h", "s").unwrap_err();
    assert!(crate::error::is_unique_violation(&err));
    assert_eq!(User::count(&pool).unwrap(), 1);
}

#[test]
fn user_email_taken_ignores_self() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    assert!(!User::email_taken(&pool, "ada@example.com", Some(ada.id)).unwrap());
    assert!(User::email_taken(&pool, "ada@example.com", None).unwrap());
}

#[test]
fn user_password_change_resalts() {
    let pool = test_pool();
    let user = make_user(&pool, "ada", "lovelace1");
    let old_salt = User::salt_for(&pool, user.id).unwrap().unwrap();

    let new_salt = auth::generate_salt();
    let hash = auth::hash_password("babbage22", &new_salt).unwrap();
    User::update_password(&pool, user.id, &hash, &new_salt).unwrap();

    let user = User::get_by_id(&pool, user.id).unwrap().unwrap();
    let salt = User::salt_for(&pool, user.id).unwrap().unwrap();
    assert_ne!(salt, old_salt);
    assert!(auth::verify_password("babbage22", &salt, &user.password_hash));
    assert!(!auth::verify_password("lovelace1", &salt, &user.password_hash));
}

#[test]
fn session_resolves_active_user_only() {
    let pool = test_pool();
    let user = make_user(&pool, "ada", "lovelace1");
    let sid = auth::create_session(&pool, &user, 24).unwrap();
    assert_eq!(auth::session_user(&pool, &sid).unwrap().map(|u| u.id), Some(user.id));

    // Deactivation drops the session outright
    User::set_active(&pool, user.id, false).unwrap();
    assert!(auth::session_user(&pool, &sid).unwrap().is_none());

    User::set_active(&pool, user.id, true).unwrap();
    let sid = auth::create_session(&pool, &user, 24).unwrap();
    auth::destroy_session(&pool, &sid).unwrap();
    assert!(auth::session_user(&pool, &sid).unwrap().is_none());
    // Destroying twice is harmless
    auth::destroy_session(&pool, &sid).unwrap();
}

#[test]
fn session_expired_is_ignored_and_cleaned() {
    let pool = test_pool();
    let user = make_user(&pool, "ada", "lovelace1");
    let sid = auth::create_session(&pool, &user, 24).unwrap();
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE id = ?2",
            rusqlite::params![chrono::Utc::now().naive_utc() - chrono::Duration::hours(1), sid],
        )
        .unwrap();
    }
    assert!(auth::session_user(&pool, &sid).unwrap().is_none());
    assert_eq!(auth::cleanup_expired_sessions(&pool).unwrap(), 1);
}

#[test]
fn user_delete_cascades() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Notes", "published");
    comment(&pool, &ada, post.id, None, "first", true);
    Admin::assign(&pool, ada.id, "editor").unwrap();

    assert!(User::delete(&pool, ada.id).unwrap());
    assert!(Post::find_by_id(&pool, post.id).unwrap().is_none());
    assert!(User::salt_for(&pool, ada.id).unwrap().is_none());
    assert!(Admin::role_for(&pool, ada.id).unwrap().is_none());
    assert!(!User::delete(&pool, ada.id).unwrap());
}

// ═══════════════════════════════════════════════════════════
// Capabilities
// ═══════════════════════════════════════════════════════════

#[test]
fn capability_follows_admin_row() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    assert_eq!(Capability::resolve(&pool, ada.id).unwrap(), Capability::guest());

    Admin::assign(&pool, ada.id, "admin").unwrap();
    let cap = Capability::resolve(&pool, ada.id).unwrap();
    assert!(cap.is_admin);
    assert_eq!(cap.role, Role::Admin);

    // Reassigning replaces the row
    Admin::assign(&pool, ada.id, "superadmin").unwrap();
    assert_eq!(Capability::resolve(&pool, ada.id).unwrap().role, Role::SuperAdmin);
    assert_eq!(Admin::count(&pool).unwrap(), 1);

    assert!(Admin::revoke(&pool, ada.id).unwrap());
    assert!(!Capability::resolve(&pool, ada.id).unwrap().is_admin);
}

#[test]
fn capability_rejects_unknown_role_in_db() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    assert!(Admin::assign(&pool, ada.id, "owner").is_err());
}

// ═══════════════════════════════════════════════════════════
// Posts
// ═══════════════════════════════════════════════════════════

#[test]
fn post_unknown_status_is_coerced_to_draft() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Odd", "pending-review");
    assert_eq!(post.status, PostStatus::Draft);

    let post = make_post(&pool, &ada, "Loud", "PUBLISHED");
    assert_eq!(post.status, PostStatus::Published);

    let changes = PostUpdate {
        status: Some("scheduled".to_string()),
        ..Default::default()
    };
    Post::update(&pool, post.id, &changes).unwrap();
    assert_eq!(Post::find_by_id(&pool, post.id).unwrap().unwrap().status, PostStatus::Draft);

    Post::set_status(&pool, post.id, PostStatus::coerce("archived")).unwrap();
    assert_eq!(Post::find_by_id(&pool, post.id).unwrap().unwrap().status, PostStatus::Archived);
}

#[test]
fn post_partial_update_leaves_other_fields() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let cat = Category::create(&pool, &CategoryForm { name: "Tech".into(), description: None }).unwrap();
    let id = Post::create(&pool, ada.id, &post_form("Original", Some("draft"), Some(cat))).unwrap();

    let changes = PostUpdate {
        title: Some("Renamed".to_string()),
        ..Default::default()
    };
    Post::update(&pool, id, &changes).unwrap();
    let post = Post::find_by_id(&pool, id).unwrap().unwrap();
    assert_eq!(post.title, "Renamed");
    assert_eq!(post.content, "Body of Original");
    assert_eq!(post.category_id, Some(cat));
    assert_eq!(post.category_name.as_deref(), Some("Tech"));

    // Explicit null clears the category
    let changes = PostUpdate {
        category_id: Some(None),
        ..Default::default()
    };
    Post::update(&pool, id, &changes).unwrap();
    assert_eq!(Post::find_by_id(&pool, id).unwrap().unwrap().category_id, None);
}

#[test]
fn post_columns_and_tags_are_written_together() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let mut form = post_form("Tagged", Some("draft"), None);
    form.tags = Some(vec!["x".into(), " z ".into(), "x".into()]);
    let id = Post::create(&pool, ada.id, &form).unwrap();
    assert_eq!(names(&Tag::for_post(&pool, id).unwrap()), vec!["x", "z"]);

    let changes = PostUpdate {
        title: Some("Retagged".to_string()),
        tags: Some(vec!["y".into(), "z".into()]),
        ..Default::default()
    };
    Post::update(&pool, id, &changes).unwrap();
    assert_eq!(Post::find_by_id(&pool, id).unwrap().unwrap().title, "Retagged");
    assert_eq!(names(&Tag::for_post(&pool, id).unwrap()), vec!["y", "z"]);

    // Linking tags to a missing post fails and rolls the new tag row back with it
    let changes = PostUpdate {
        title: Some("Ghost".to_string()),
        tags: Some(vec!["orphan".into()]),
        ..Default::default()
    };
    assert!(Post::update(&pool, 9999, &changes).is_err());
    assert_eq!(Tag::find_by_name(&pool, "orphan").unwrap(), None);
}

#[test]
fn post_publish_scenario() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let tech = Category::create(&pool, &CategoryForm { name: "Tech".into(), description: None }).unwrap();
    let id = Post::create(&pool, ada.id, &post_form("Rust tips", Some("draft"), Some(tech))).unwrap();

    let published = PostFilter::published();
    assert!(Post::list(&pool, &published, 10, 0).unwrap().is_empty());

    Post::set_status(&pool, id, PostStatus::Published).unwrap();
    let listed = Post::list(&pool, &published, 10, 0).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Rust tips");
    assert_eq!(listed[0].content, "Body of Rust tips");
    assert_eq!(Post::count(&pool, &published).unwrap(), 1);
}

#[test]
fn post_filters_combine() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let bob = make_user(&pool, "bob", "builder12");
    make_post(&pool, &ada, "Ada one", "published");
    make_post(&pool, &ada, "Ada draft", "draft");
    let bob_post = make_post(&pool, &bob, "Bob one", "published");
    Tag::set_for_post(&pool, bob_post.id, &["rust".to_string()]).unwrap();

    let by_ada = PostFilter {
        author_id: Some(ada.id),
        ..PostFilter::published()
    };
    assert_eq!(Post::count(&pool, &by_ada).unwrap(), 1);

    let all_ada = PostFilter {
        author_id: Some(ada.id),
        ..Default::default()
    };
    assert_eq!(Post::count(&pool, &all_ada).unwrap(), 2);

    let tagged = PostFilter {
        tag: Some("rust".to_string()),
        ..PostFilter::published()
    };
    let posts = Post::list(&pool, &tagged, 10, 0).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, bob_post.id);

    let counts = Post::count_by_status(&pool).unwrap();
    assert_eq!(counts["published"], 2);
    assert_eq!(counts["draft"], 1);
    assert_eq!(counts["archived"], 0);
}

#[test]
fn post_search_is_substring_and_escapes_wildcards() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    make_post(&pool, &ada, "Learning RUST", "published");
    make_post(&pool, &ada, "100% coverage", "published");
    make_post(&pool, &ada, "Rusty drafts", "draft");

    let search = |term: &str| {
        let filter = PostFilter {
            search: Some(term.to_string()),
            ..PostFilter::published()
        };
        Post::list(&pool, &filter, 10, 0).unwrap()
    };

    // ASCII LIKE is case-insensitive; drafts never match
    assert_eq!(search("rust").len(), 1);
    assert_eq!(search("100%").len(), 1);
    // A bare % must not behave as a wildcard
    assert_eq!(search("%").len(), 1);
    assert_eq!(search("_").len(), 0);
}

#[test]
fn post_featured_requires_image_and_sorts_by_views() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let mut form = post_form("Quiet", Some("published"), None);
    form.featured_image = Some("/uploads/a.png".to_string());
    let quiet = Post::create(&pool, ada.id, &form).unwrap();
    let mut form = post_form("Popular", Some("published"), None);
    form.featured_image = Some("/uploads/b.png".to_string());
    let popular = Post::create(&pool, ada.id, &form).unwrap();
    make_post(&pool, &ada, "No image", "published");
    for _ in 0..3 {
        Post::increment_views(&pool, popular).unwrap();
    }

    let filter = PostFilter {
        featured_only: true,
        order: crate::models::post::PostOrder::MostViewed,
        ..PostFilter::published()
    };
    let ids: Vec<i64> = Post::list(&pool, &filter, 10, 0).unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![popular, quiet]);
}

#[test]
fn post_views_increment_by_one() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Counted", "published");
    assert_eq!(post.views_count, 0);
    Post::increment_views(&pool, post.id).unwrap();
    Post::increment_views(&pool, post.id).unwrap();
    assert_eq!(Post::find_by_id(&pool, post.id).unwrap().unwrap().views_count, 2);
}

#[test]
fn post_views_survive_concurrent_increments() {
    let dir = std::env::temp_dir().join(format!("quill-views-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("views.db");
    let pool = init_pool_at(path.to_str().unwrap()).unwrap();
    run_migrations(&pool).unwrap();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Hot", "published");

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    Post::increment_views(&pool, post.id).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(Post::find_by_id(&pool, post.id).unwrap().unwrap().views_count, 200);
    drop(pool);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn post_delete_cascades_children() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Doomed", "published");
    let c = comment(&pool, &ada, post.id, None, "hi", true);
    Tag::set_for_post(&pool, post.id, &["x".to_string()]).unwrap();
    Reaction::upsert(&pool, post.id, ada.id, ReactionKind::Like).unwrap();

    assert!(Post::delete(&pool, post.id).unwrap());
    assert!(Comment::find_by_id(&pool, c).unwrap().is_none());
    assert!(Tag::for_post(&pool, post.id).unwrap().is_empty());
    assert_eq!(Reaction::summary(&pool, post.id, None).unwrap().likes, 0);
    // The tag row itself stays for other posts
    assert!(Tag::find_by_name(&pool, "x").unwrap().is_some());
    assert!(!Post::delete(&pool, post.id).unwrap());
}

// ═══════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════

#[test]
fn category_delete_guard() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let form = CategoryForm { name: "Tech".into(), description: Some("Gadgets".into()) };
    let cat = Category::create(&pool, &form).unwrap();
    let post = Post::create(&pool, ada.id, &post_form("In Tech", Some("draft"), Some(cat))).unwrap();

    assert_eq!(Category::find_by_id(&pool, cat).unwrap().unwrap().post_count, 1);
    assert_eq!(Category::delete(&pool, cat).unwrap(), CategoryDelete::InUse(1));

    Post::delete(&pool, post).unwrap();
    assert_eq!(Category::delete(&pool, cat).unwrap(), CategoryDelete::Deleted);
    assert_eq!(Category::delete(&pool, cat).unwrap(), CategoryDelete::NotFound);
}

#[test]
fn category_names_are_unique() {
    let pool = test_pool();
    let tech = Category::create(&pool, &CategoryForm { name: "Tech".into(), description: None }).unwrap();
    assert!(Category::name_taken(&pool, "Tech", None).unwrap());
    assert!(!Category::name_taken(&pool, "Tech", Some(tech)).unwrap());
    let err = Category::create(&pool, &CategoryForm { name: "Tech".into(), description: None }).unwrap_err();
    assert!(crate::error::is_unique_violation(&err));
}

#[test]
fn category_list_counts_posts() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let a = Category::create(&pool, &CategoryForm { name: "Alpha".into(), description: None }).unwrap();
    Category::create(&pool, &CategoryForm { name: "Beta".into(), description: None }).unwrap();
    Post::create(&pool, ada.id, &post_form("one", None, Some(a))).unwrap();
    Post::create(&pool, ada.id, &post_form("two", None, Some(a))).unwrap();

    let list = Category::list(&pool).unwrap();
    let counts: Vec<(String, i64)> = list.into_iter().map(|c| (c.name, c.post_count)).collect();
    assert_eq!(counts, vec![("Alpha".to_string(), 2), ("Beta".to_string(), 0)]);
}

// ═══════════════════════════════════════════════════════════
// Tags
// ═══════════════════════════════════════════════════════════

#[test]
fn tags_reconcile_to_requested_set() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Tagged", "published");

    let first = Tag::set_for_post(&pool, post.id, &["a".into(), "b".into()]).unwrap();
    assert_eq!(names(&first), vec!["a", "b"]);
    let b_id = first.iter().find(|t| t.name == "b").unwrap().id;

    let second = Tag::set_for_post(&pool, post.id, &["b".into(), "c".into()]).unwrap();
    assert_eq!(names(&second), vec!["b", "c"]);
    // "b" kept its row
    assert_eq!(second.iter().find(|t| t.name == "b").unwrap().id, b_id);

    let conn = pool.get().unwrap();
    let b_rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags WHERE name = 'b'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(b_rows, 1);
}

#[test]
fn tags_reconcile_is_idempotent_and_normalizes() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Tagged", "published");
    let input: Vec<String> = vec![" rust ".into(), "".into(), "rust".into(), "Rust".into()];

    let once = Tag::set_for_post(&pool, post.id, &input).unwrap();
    let twice = Tag::set_for_post(&pool, post.id, &input).unwrap();
    assert_eq!(once, twice);
    assert_eq!(names(&twice), vec!["Rust", "rust"]);
    assert_eq!(Tag::count(&pool).unwrap(), 2);

    // Empty list clears links only
    assert!(Tag::set_for_post(&pool, post.id, &[]).unwrap().is_empty());
    assert_eq!(Tag::count(&pool).unwrap(), 2);
}

#[test]
fn tags_shared_across_posts() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let p1 = make_post(&pool, &ada, "One", "published");
    let p2 = make_post(&pool, &ada, "Two", "published");
    Tag::set_for_post(&pool, p1.id, &["shared".into()]).unwrap();
    Tag::set_for_post(&pool, p2.id, &["shared".into()]).unwrap();
    let id = Tag::find_or_create(&pool, "shared").unwrap();

    let listed = Tag::list_with_counts(&pool).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].post_count, 2);

    assert!(Tag::delete(&pool, id).unwrap());
    assert!(Tag::for_post(&pool, p1.id).unwrap().is_empty());
    assert!(Tag::find_or_create(&pool, "   ").is_err());
}

// ═══════════════════════════════════════════════════════════
// Comments
// ═══════════════════════════════════════════════════════════

#[test]
fn comments_thread_one_level() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let bob = make_user(&pool, "bob", "builder12");
    let post = make_post(&pool, &ada, "Talk", "published");

    let top = comment(&pool, &ada, post.id, None, "top", true);
    comment(&pool, &bob, post.id, Some(top), "reply", true);
    comment(&pool, &bob, post.id, Some(top), "hidden reply", false);
    let pending_top = comment(&pool, &bob, post.id, None, "pending top", false);
    comment(&pool, &ada, post.id, Some(pending_top), "reply to pending", true);

    let public = Comment::threads_for_post(&pool, post.id, false).unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].comment.id, top);
    assert_eq!(public[0].replies.len(), 1);
    assert_eq!(public[0].replies[0].content, "reply");

    let moderator = Comment::threads_for_post(&pool, post.id, true).unwrap();
    assert_eq!(moderator.len(), 2);
    assert_eq!(moderator[0].replies.len(), 2);
    assert_eq!(moderator[1].replies.len(), 1);
}

#[test]
fn comments_moderation_and_cascade() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let post = make_post(&pool, &ada, "Talk", "published");
    let top = comment(&pool, &ada, post.id, None, "top", false);
    let reply = comment(&pool, &ada, post.id, Some(top), "reply", true);

    assert_eq!(Comment::count(&pool, Some(false)).unwrap(), 1);
    assert!(Comment::set_approved(&pool, top, true).unwrap());
    assert_eq!(Comment::count(&pool, Some(false)).unwrap(), 0);
    assert!(!Comment::set_approved(&pool, 9999, true).unwrap());

    Comment::update_content(&pool, top, "  edited  ").unwrap();
    assert_eq!(Comment::find_by_id(&pool, top).unwrap().unwrap().content, "edited");

    assert!(Comment::delete(&pool, top).unwrap());
    assert!(Comment::find_by_id(&pool, reply).unwrap().is_none());
    assert_eq!(Comment::list(&pool, None, 10, 0).unwrap().len(), 0);
}

// ═══════════════════════════════════════════════════════════
// Reactions
// ═══════════════════════════════════════════════════════════

#[test]
fn reactions_upsert_one_per_user() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let bob = make_user(&pool, "bob", "builder12");
    let post = make_post(&pool, &ada, "Opinions", "published");

    Reaction::upsert(&pool, post.id, ada.id, ReactionKind::Like).unwrap();
    Reaction::upsert(&pool, post.id, bob.id, ReactionKind::Like).unwrap();
    Reaction::upsert(&pool, post.id, bob.id, ReactionKind::Dislike).unwrap();

    let summary = Reaction::summary(&pool, post.id, Some(bob.id)).unwrap();
    assert_eq!((summary.likes, summary.dislikes), (1, 1));
    assert_eq!(summary.mine, Some(ReactionKind::Dislike));

    assert!(Reaction::remove(&pool, post.id, bob.id).unwrap());
    assert!(!Reaction::remove(&pool, post.id, bob.id).unwrap());
    let summary = Reaction::summary(&pool, post.id, Some(bob.id)).unwrap();
    assert_eq!((summary.likes, summary.dislikes, summary.mine), (1, 0, None));
}

// ═══════════════════════════════════════════════════════════
// Dashboard
// ═══════════════════════════════════════════════════════════

#[test]
fn dashboard_aggregates() {
    let pool = test_pool();
    let ada = make_user(&pool, "ada", "lovelace1");
    let bob = make_user(&pool, "bob", "builder12");
    Admin::assign(&pool, ada.id, "superadmin").unwrap();
    let post = make_post(&pool, &ada, "Live", "published");
    make_post(&pool, &bob, "Draft", "draft");
    comment(&pool, &bob, post.id, None, "ok", true);
    comment(&pool, &bob, post.id, None, "wait", false);
    Category::create(&pool, &CategoryForm { name: "Misc".into(), description: None }).unwrap();
    Tag::set_for_post(&pool, post.id, &["t".into()]).unwrap();

    let dash = Dashboard::load(&pool, 5).unwrap();
    assert_eq!(dash.stats.users, 2);
    assert_eq!(dash.stats.admins, 1);
    assert_eq!(dash.stats.posts, 2);
    assert_eq!(dash.stats.posts_by_status["draft"], 1);
    assert_eq!(dash.stats.comments, 2);
    assert_eq!(dash.stats.pending_comments, 1);
    assert_eq!(dash.stats.categories, 1);
    assert_eq!(dash.stats.tags, 1);
    assert_eq!(dash.recent_posts.len(), 2);
    assert_eq!(dash.recent_comments.len(), 2);
    assert_eq!(dash.recent_users.len(), 2);

    let limited = Dashboard::load(&pool, 1).unwrap();
    assert_eq!(limited.recent_posts.len(), 1);
}

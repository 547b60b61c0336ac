mod database;
mod error;
mod lifecycle;
mod model;
mod settings;
mod store;
mod wheel;

use actix_web::{error as web_error, middleware::Logger, web, App, HttpResponse, HttpServer};
use log::debug;
use model::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use store::Store;

struct AppData {
    store: Mutex<Store>,
    tera: tera::Tera,
    spin_delay: Duration,
}

type Data = web::Data<AppData>;

fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> web_error::Error {
    debug!("{:?}", err);
    web_error::ErrorInternalServerError(message)
}

fn render(data: &AppData, template: &str, ctx: &tera::Context) -> actix_web::Result<HttpResponse> {
    let body = data
        .tera
        .render(template, ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header(("location", location))
        .finish()
}

fn night_location(id: NightId) -> String {
    format!("/nights/{}", id)
}

#[derive(Serialize)]
struct NightView<'a> {
    id: NightId,
    theme: &'a str,
    date: &'a str,
    submissions: usize,
    eliminated: usize,
    winner: Option<&'a str>,
    can_spin: bool,
    phase: Phase,
}

impl<'a> NightView<'a> {
    fn new(night: &'a MovieNight) -> Self {
        NightView {
            id: night.id,
            theme: &night.theme,
            date: &night.date,
            submissions: night.submissions.len(),
            eliminated: night.eliminated.len(),
            winner: night.winning_submission().map(|s| s.title.as_str()),
            can_spin: night.can_spin(),
            phase: night.phase(),
        }
    }
}

#[derive(Serialize)]
struct SubmissionView<'a> {
    id: SubmissionId,
    title: &'a str,
    user_id: &'a str,
    votes: i64,
    own: bool,
    eliminated: bool,
    winner: bool,
    my_vote: Option<Vote>,
}

async fn index(data: Data) -> actix_web::Result<HttpResponse> {
    let store = wheel::lock(&data.store);
    let mut ctx = tera::Context::new();
    let user = match store.current_user() {
        Some(user) => user,
        None => return render(&data, "login.html", &ctx),
    };
    let snapshot = store.snapshot();
    ctx.insert("user", user);
    ctx.insert("themes", &snapshot.themes);
    ctx.insert(
        "upcoming",
        &lifecycle::upcoming_night(&snapshot.nights).map(NightView::new),
    );
    ctx.insert(
        "past",
        &lifecycle::past_nights(&snapshot.nights)
            .map(NightView::new)
            .collect::<Vec<_>>(),
    );
    ctx.insert("reminder", &lifecycle::reminder_of(&snapshot.reminders, user));
    render(&data, "index.html", &ctx)
}

#[derive(Deserialize)]
struct LoginParams {
    name: String,
}

async fn login_post(params: web::Form<LoginParams>, data: Data) -> actix_web::Result<HttpResponse> {
    wheel::lock(&data.store)
        .login(params.name.trim())
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/"))
}

async fn logout(data: Data) -> actix_web::Result<HttpResponse> {
    wheel::lock(&data.store)
        .logout()
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/"))
}

#[derive(Deserialize)]
struct ThemeParams {
    theme: String,
}

#[derive(Deserialize)]
struct ThemeUpdateParams {
    old: String,
    new: String,
}

async fn theme_add(params: web::Form<ThemeParams>, data: Data) -> actix_web::Result<HttpResponse> {
    wheel::lock(&data.store)
        .add_theme(params.theme.trim())
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/"))
}

async fn theme_update(params: web::Form<ThemeUpdateParams>, data: Data) -> actix_web::Result<HttpResponse> {
    wheel::lock(&data.store)
        .update_theme(&params.old, params.new.trim())
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/"))
}

async fn theme_delete(params: web::Form<ThemeParams>, data: Data) -> actix_web::Result<HttpResponse> {
    wheel::lock(&data.store)
        .delete_theme(&params.theme)
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/"))
}

async fn night_create(params: web::Form<ThemeParams>, data: Data) -> actix_web::Result<HttpResponse> {
    let id = wheel::lock(&data.store)
        .create_night(&params.theme)
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect(&night_location(id)))
}

#[derive(Deserialize)]
struct ReminderParams {
    phone: String,
}

#[derive(Deserialize)]
struct ReminderDeleteParams {
    id: u64,
}

async fn reminder_add(params: web::Form<ReminderParams>, data: Data) -> actix_web::Result<HttpResponse> {
    wheel::lock(&data.store)
        .add_reminder(params.phone.trim())
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/"))
}

async fn reminder_delete(params: web::Form<ReminderDeleteParams>, data: Data) -> actix_web::Result<HttpResponse> {
    wheel::lock(&data.store)
        .remove_reminder(params.id)
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/"))
}

async fn night(path: web::Path<NightId>, data: Data) -> actix_web::Result<HttpResponse> {
    let id = path.into_inner();
    let mut store = wheel::lock(&data.store);
    store.select(id);
    let (user, night) = match (store.current_user(), store.selected_night()) {
        (Some(user), Some(night)) => (user, night),
        _ => return Ok(redirect("/")),
    };
    let submissions = night
        .submissions
        .iter()
        .map(|s| SubmissionView {
            id: s.id,
            title: &s.title,
            user_id: &s.user_id,
            votes: s.votes,
            own: s.user_id == user,
            eliminated: night.is_eliminated(s.id),
            winner: night.winner == Some(s.id),
            my_vote: s.voters.get(user).copied(),
        })
        .collect::<Vec<_>>();
    let mut ctx = tera::Context::new();
    ctx.insert("user", user);
    ctx.insert("night", &NightView::new(night));
    ctx.insert("submissions", &submissions);
    ctx.insert("submitted", &night.submission_of(user).is_some());
    ctx.insert("spinning", &store.is_spinning());
    render(&data, "night.html", &ctx)
}

#[derive(Deserialize)]
struct DateParams {
    date: String,
}

async fn night_date(
    path: web::Path<NightId>,
    params: web::Form<DateParams>,
    data: Data,
) -> actix_web::Result<HttpResponse> {
    let id = path.into_inner();
    wheel::lock(&data.store)
        .update_date(id, params.date.trim())
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect(&night_location(id)))
}

#[derive(Deserialize)]
struct TitleParams {
    title: String,
}

/// Whether the current user may still change `movie_id` in this night.
fn owns_open_submission(store: &Store, night_id: NightId, movie_id: SubmissionId) -> bool {
    match (store.current_user(), store.night(night_id)) {
        (Some(user), Some(night)) => {
            night.winner.is_none()
                && night
                    .submissions
                    .iter()
                    .any(|s| s.id == movie_id && s.user_id == user)
        }
        _ => false,
    }
}

async fn submission_add(
    path: web::Path<NightId>,
    params: web::Form<TitleParams>,
    data: Data,
) -> actix_web::Result<HttpResponse> {
    let id = path.into_inner();
    let mut store = wheel::lock(&data.store);
    if store.night(id).map_or(false, |n| n.winner.is_none()) {
        store
            .add_submission(id, params.title.trim())
            .map_err(|err| log_error(err, "Database error"))?;
    }
    Ok(redirect(&night_location(id)))
}

async fn submission_update(
    path: web::Path<(NightId, SubmissionId)>,
    params: web::Form<TitleParams>,
    data: Data,
) -> actix_web::Result<HttpResponse> {
    let (id, movie_id) = path.into_inner();
    let mut store = wheel::lock(&data.store);
    if owns_open_submission(&store, id, movie_id) && !params.title.trim().is_empty() {
        store
            .update_submission(id, movie_id, params.title.trim())
            .map_err(|err| log_error(err, "Database error"))?;
    }
    Ok(redirect(&night_location(id)))
}

async fn submission_delete(
    path: web::Path<(NightId, SubmissionId)>,
    data: Data,
) -> actix_web::Result<HttpResponse> {
    let (id, movie_id) = path.into_inner();
    let mut store = wheel::lock(&data.store);
    if owns_open_submission(&store, id, movie_id) {
        store
            .delete_submission(id, movie_id)
            .map_err(|err| log_error(err, "Database error"))?;
    }
    Ok(redirect(&night_location(id)))
}

#[derive(Deserialize)]
struct VoteParams {
    direction: Vote,
}

async fn submission_vote(
    path: web::Path<(NightId, SubmissionId)>,
    params: web::Form<VoteParams>,
    data: Data,
) -> actix_web::Result<HttpResponse> {
    let (id, movie_id) = path.into_inner();
    let mut store = wheel::lock(&data.store);
    let votable = store.night(id).map_or(false, |n| n.winner.is_none())
        && !owns_open_submission(&store, id, movie_id);
    if votable {
        store
            .vote(id, movie_id, params.direction)
            .map_err(|err| log_error(err, "Database error"))?;
    }
    Ok(redirect(&night_location(id)))
}

async fn night_spin(path: web::Path<NightId>, data: Data) -> actix_web::Result<HttpResponse> {
    let id = path.into_inner();
    let mut rng = StdRng::from_entropy();
    let outcome = wheel::spin(&data.store, id, data.spin_delay, &mut rng)
        .await
        .map_err(|err| log_error(err, "Database error"))?;
    debug!("spin on night {}: {:?}", id, outcome);
    Ok(redirect(&night_location(id)))
}

async fn reviews(path: web::Path<NightId>, data: Data) -> actix_web::Result<HttpResponse> {
    let id = path.into_inner();
    let mut store = wheel::lock(&data.store);
    store.select(id);
    let (user, night) = match (store.current_user(), store.selected_night()) {
        (Some(user), Some(night)) if night.winner.is_some() => (user, night),
        _ => return Ok(redirect(&night_location(id))),
    };
    let mut ctx = tera::Context::new();
    ctx.insert("user", user);
    ctx.insert("night", &NightView::new(night));
    ctx.insert("reviews", &night.reviews);
    ctx.insert("reviewed", &night.review_of(user).is_some());
    render(&data, "reviews.html", &ctx)
}

#[derive(Deserialize)]
struct ReviewParams {
    rating: Rating,
    #[serde(default)]
    comment: String,
}

async fn review_add(
    path: web::Path<NightId>,
    params: web::Form<ReviewParams>,
    data: Data,
) -> actix_web::Result<HttpResponse> {
    let id = path.into_inner();
    let mut store = wheel::lock(&data.store);
    let open = match (store.current_user(), store.night(id)) {
        (Some(user), Some(night)) => night.winner.is_some() && night.review_of(user).is_none(),
        _ => false,
    };
    if open {
        store
            .add_review(id, params.rating, params.comment.trim())
            .map_err(|err| log_error(err, "Database error"))?;
    }
    Ok(redirect(&format!("/nights/{}/reviews", id)))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/login", web::post().to(login_post))
        .route("/logout", web::get().to(logout))
        .route("/themes", web::post().to(theme_add))
        .route("/themes/update", web::post().to(theme_update))
        .route("/themes/delete", web::post().to(theme_delete))
        .route("/reminders", web::post().to(reminder_add))
        .route("/reminders/delete", web::post().to(reminder_delete))
        .route("/nights", web::post().to(night_create))
        .route("/nights/{id}", web::get().to(night))
        .route("/nights/{id}/date", web::post().to(night_date))
        .route("/nights/{id}/spin", web::post().to(night_spin))
        .route("/nights/{id}/reviews", web::get().to(reviews))
        .route("/nights/{id}/reviews", web::post().to(review_add))
        .route("/nights/{id}/submissions", web::post().to(submission_add))
        .route(
            "/nights/{id}/submissions/{movie}/update",
            web::post().to(submission_update),
        )
        .route(
            "/nights/{id}/submissions/{movie}/delete",
            web::post().to(submission_delete),
        )
        .route(
            "/nights/{id}/submissions/{movie}/vote",
            web::post().to(submission_vote),
        );
}

fn templates() -> tera::Result<tera::Tera> {
    tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
}

#[actix_web::main]
async fn main() -> error::Result<()> {
    dotenvy::dotenv().ok();
    let settings = settings::Config::load()?;

    env_logger::Builder::new().parse_filters(&settings.log).init();

    let db = settings.open_db()?;
    let data = web::Data::new(AppData {
        store: Mutex::new(Store::open(db)),
        tera: templates()?,
        spin_delay: settings.spin_delay(),
    });
    log::info!("listening on {}", settings.bind);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(routes)
    })
    .bind(&settings.bind)?
    .run()
    .await?;
    Ok(())
}

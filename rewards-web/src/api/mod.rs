// rewards-web/src/api/mod.rs
pub mod phone;
pub mod rewards;
pub mod session;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(
        actix_web::web::scope("/api")
            .service(session::get_session)
            .service(session::login)
            .service(session::cancel_login)
            .service(session::logout)
            .service(rewards::get_rewards)
            .service(rewards::refresh_rewards)
            .service(rewards::verify_platform)
            .service(phone::phone_status)
            .service(phone::request_otp)
            .service(phone::verify_otp)
            .service(phone::cancel),
    );
}

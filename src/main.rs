use std::sync::Arc;

use teloxide::{dispatching::UpdateFilterExt, prelude::*, types::CallbackQuery};

use salonbot::config::Config;
use salonbot::db::get_db;
use salonbot::repo::services::initialize_template_data;
use salonbot::telegram::{self, BotState};
use salonbot::reminders;

extern crate pretty_env_logger;
#[macro_use] extern crate log;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            error!("{}", e.startup_hint());
            std::process::exit(1);
        }
    };

    let db = match get_db(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Could not open the spreadsheet: {}", e);
            error!("{}", e.startup_hint());
            std::process::exit(1);
        }
    };
    if let Err(e) = initialize_template_data(&db).await {
        warn!("Service templates were not loaded: {}", e);
    }

    let bot = Bot::new(config.bot_token.clone());
    if let Err(e) = bot.set_my_commands(telegram::command_list()).await {
        warn!("Could not register bot commands: {}", e);
    }

    tokio::spawn(reminders::run(bot.clone(), db.clone(), config.admin_ids.clone()));

    let state = Arc::new(BotState::new(db, config.owner_ids.clone()));
    info!("Bot started");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let state = state.clone();

            move |bot: Bot, msg: Message| {
                let state = state.clone();

                async move { telegram::on_message(bot, msg, &state).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let state = state.clone();

            move |q: CallbackQuery, bot: Bot| {
                let state = state.clone();

                async move { telegram::on_callback_query(bot, q, &state).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

use anyhow::Result;

use kopilka_core::validator::RegistrationInput;
use kopilka_data::DataError;

use crate::prompt::{or_prompt, prompt_secret};
use crate::state::App;

pub async fn register(app: &mut App, name: Option<String>, email: Option<String>) -> Result<()> {
    let input = RegistrationInput {
        name: or_prompt(name, "Имя")?,
        email: or_prompt(email, "Email")?,
        password: prompt_secret("Пароль")?,
        password_confirm: prompt_secret("Повторите пароль")?,
    };
    match app.auth.register(&mut app.dm, &input).await {
        Ok(user) => {
            println!("Аккаунт создан: {} <{}>", user.name, user.email);
            println!("Next: kopilka login --email {}", user.email);
            Ok(())
        }
        Err(DataError::Validation(messages)) => {
            for m in &messages {
                eprintln!("- {m}");
            }
            anyhow::bail!("registration rejected")
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn login(app: &mut App, email: Option<String>) -> Result<()> {
    let email = or_prompt(email, "Email")?;
    let password = prompt_secret("Пароль")?;
    match app.auth.login(&mut app.dm, &email, &password).await {
        Ok((user, session)) => {
            println!("Добро пожаловать, {}!", user.name);
            let info = session.info(app.dm.now());
            println!("Сессия активна ещё {} мин.", info.remaining_seconds / 60);
            Ok(())
        }
        Err(DataError::Locked { remaining }) => {
            let minutes = (remaining.num_seconds() + 59) / 60;
            anyhow::bail!("Слишком много попыток входа. Попробуйте через {minutes} мин.")
        }
        Err(DataError::InvalidCredentials) => anyhow::bail!("Неверный email или пароль"),
        Err(e) => Err(e.into()),
    }
}

pub fn logout(app: &mut App) -> Result<()> {
    match app.dm.current_user().map(|u| u.email.clone()) {
        Some(email) => {
            app.auth.logout(&mut app.dm);
            println!("Выход выполнен ({email})");
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

pub fn session(app: &mut App) -> Result<()> {
    let session = app.require_session()?;
    let info = session.info(app.dm.now());
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

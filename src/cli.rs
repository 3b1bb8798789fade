use sqlx::SqlitePool;

use crate::db;
use crate::models::User;
use crate::password::hash_password;
use crate::routes::auth::password_problem;
use crate::workflow::normalize_email;

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = normalize_email(email)?;
    if let Some(problem) = password_problem(password) {
        return Err(problem.into());
    }

    if db::find_user_by_email(pool, &email).await?.is_some() {
        return Err(format!("User with email '{}' already exists", email).into());
    }

    let user = User::new(
        email,
        first_name.to_string(),
        last_name.to_string(),
        hash_password(password)?,
    );

    let mut conn = pool.acquire().await?;
    db::insert_user(&mut conn, &user).await?;

    println!("Created user:");
    println!("  ID: {}", user.id);
    println!("  Email: {}", user.email);
    println!("  Name: {}", user.full_name());

    Ok(())
}

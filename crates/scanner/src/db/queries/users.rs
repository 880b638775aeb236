use super::*;

impl Database {
    /// Creates a user on the free plan.
    pub async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        now: DateTimeUtc,
    ) -> Result<user::Model> {
        self.transaction(|tx| async move {
            let user = user::Entity::insert(user::ActiveModel {
                email: ActiveValue::set(email.to_string()),
                name: ActiveValue::set(name.map(str::to_string)),
                plan: ActiveValue::set(Plan::Free.as_str().to_string()),
                created_at: ActiveValue::set(now.naive_utc()),
                ..Default::default()
            })
            .exec_with_returning(&*tx)
            .await?;

            Ok(user)
        })
        .await
    }

    pub async fn get_user_by_id(&self, id: UserId) -> Result<Option<user::Model>> {
        self.transaction(|tx| async move { Ok(user::Entity::find_by_id(id).one(&*tx).await?) })
            .await
    }

    /// Returns the user with the given email address, which is how principals are resolved.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<user::Model>> {
        self.transaction(|tx| async move {
            Ok(user::Entity::find()
                .filter(user::Column::Email.eq(email))
                .one(&*tx)
                .await?)
        })
        .await
    }

    /// Moves a user to a different plan outside of the billing flow (admin action).
    pub async fn set_user_plan(&self, id: UserId, plan: Plan) -> Result<()> {
        self.transaction(|tx| async move {
            set_user_plan(&tx, id, plan).await?;
            Ok(())
        })
        .await
    }
}

pub(super) async fn set_user_plan(tx: &DatabaseTransaction, id: UserId, plan: Plan) -> Result<()> {
    let result = user::Entity::update_many()
        .set(user::ActiveModel {
            plan: ActiveValue::set(plan.as_str().to_string()),
            ..Default::default()
        })
        .filter(user::Column::Id.eq(id))
        .exec(tx)
        .await?;

    if result.rows_affected == 0 {
        Err(anyhow!("no user with id {id}"))?;
    }

    Ok(())
}

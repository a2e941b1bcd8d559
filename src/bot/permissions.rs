//! Comprobaciones de permisos y jerarquía de roles

use serenity::{
    model::{
        id::{GuildId, RoleId, UserId},
        permissions::Permissions,
    },
    prelude::Context,
};

const MODERATOR_ROLE_NAMES: [&str; 4] = ["admin", "administrator", "mod", "moderator"];

/// Datos del autor copiados de la caché del guild
#[derive(Debug, Clone, Default)]
pub struct AuthorAccess {
    pub permissions: Permissions,
    pub role_names: Vec<String>,
    pub is_owner: bool,
}

impl AuthorAccess {
    pub fn is_moderator(&self) -> bool {
        self.permissions.administrator()
            || self
                .role_names
                .iter()
                .any(|name| MODERATOR_ROLE_NAMES.contains(&name.to_lowercase().as_str()))
    }

    pub fn is_administrator(&self) -> bool {
        self.permissions.administrator() || self.is_owner
    }
}

/// Motivo por el que una acción de moderación no está permitida
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyDenial {
    BotTooLow,
    AuthorTooLow,
}

impl HierarchyDenial {
    pub fn message(&self, action: &str) -> String {
        match self {
            HierarchyDenial::BotTooLow => {
                format!("I cannot {} this member due to role hierarchy.", action)
            }
            HierarchyDenial::AuthorTooLow => {
                format!("You cannot {} this member due to role hierarchy.", action)
            }
        }
    }
}

/// El rol más alto del bot debe superar al del objetivo, y el del autor también
/// salvo que el autor sea el dueño del servidor.
pub fn check_hierarchy(
    author_top: u16,
    target_top: u16,
    bot_top: u16,
    author_is_owner: bool,
) -> Result<(), HierarchyDenial> {
    if bot_top <= target_top {
        return Err(HierarchyDenial::BotTooLow);
    }
    if !author_is_owner && author_top <= target_top {
        return Err(HierarchyDenial::AuthorTooLow);
    }
    Ok(())
}

/// Copia permisos y nombres de roles del autor desde la caché
pub fn author_access(
    ctx: &Context,
    guild_id: GuildId,
    author: UserId,
    roles: &[RoleId],
) -> AuthorAccess {
    let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
        return AuthorAccess::default();
    };

    let is_owner = guild.owner_id == author;
    let role_names = roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .map(|role| role.name.clone())
        .collect();

    let everyone = guild
        .roles
        .get(&RoleId::new(guild_id.get()))
        .map(|r| r.permissions)
        .unwrap_or_else(Permissions::empty);
    let permissions = roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .fold(everyone, |acc, role| acc | role.permissions);

    AuthorAccess {
        permissions: if is_owner { Permissions::all() } else { permissions },
        role_names,
        is_owner,
    }
}

/// Posición del rol más alto (0 = solo @everyone)
pub fn top_role_position(ctx: &Context, guild_id: GuildId, roles: &[RoleId]) -> u16 {
    guild_id
        .to_guild_cached(&ctx.cache)
        .map(|guild| {
            roles
                .iter()
                .filter_map(|id| guild.roles.get(id))
                .map(|role| role.position)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

pub fn owner_id(ctx: &Context, guild_id: GuildId) -> Option<UserId> {
    guild_id.to_guild_cached(&ctx.cache).map(|g| g.owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderator_by_role_name() {
        let access = AuthorAccess {
            role_names: vec!["Members".to_string(), "MoDeRaToR".to_string()],
            ..Default::default()
        };
        assert!(access.is_moderator());
        assert!(!access.is_administrator());

        let access = AuthorAccess {
            role_names: vec!["moderators".to_string()],
            ..Default::default()
        };
        assert!(!access.is_moderator());
    }

    #[test]
    fn administrators_and_owners() {
        let admin = AuthorAccess {
            permissions: Permissions::ADMINISTRATOR,
            ..Default::default()
        };
        assert!(admin.is_moderator());
        assert!(admin.is_administrator());

        let owner = AuthorAccess {
            is_owner: true,
            ..Default::default()
        };
        assert!(owner.is_administrator());
    }

    #[test]
    fn hierarchy_rules() {
        assert_eq!(check_hierarchy(5, 3, 10, false), Ok(()));
        assert_eq!(check_hierarchy(5, 10, 10, false), Err(HierarchyDenial::BotTooLow));
        assert_eq!(check_hierarchy(3, 3, 10, false), Err(HierarchyDenial::AuthorTooLow));
        assert_eq!(check_hierarchy(0, 3, 10, true), Ok(()));
        assert!(HierarchyDenial::AuthorTooLow.message("ban").starts_with("You cannot ban"));
    }
}

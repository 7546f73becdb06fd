use anyhow::Result;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult, Script};
use tracing::{debug, info};
use uuid::Uuid;

use super::CacheConfig;

/// SET si la clave no existe o ya pertenece al mismo holder (renueva el TTL, en ms)
const ACQUIRE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
    return 1
end
if current == ARGV[1] then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

/// DEL sólo si el valor coincide con el holder
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Cliente Redis con connection manager y operaciones async
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: CacheConfig,
}

impl RedisClient {
    /// Crear nuevo cliente Redis
    pub async fn new(config: CacheConfig) -> Result<Self> {
        info!("🔗 Conectando a Redis: {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.clone())?;
        let manager = ConnectionManager::new(client).await?;

        // Test de conexión usando un comando simple
        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("✅ Redis conectado exitosamente");

        Ok(Self { manager, config })
    }

    /// Generar clave con prefijo
    fn make_key(&self, prefix: &str, identifier: &str) -> String {
        format!("{}:{}:{}", self.config.key_prefix, prefix, identifier)
    }

    /// Clave de reserva de un vehículo
    pub fn vehicle_lock_key(&self, vehicle_id: Uuid) -> String {
        self.make_key("vehicle_lock", &vehicle_id.to_string())
    }

    /// Tomar o renovar la clave para `holder`; false si pertenece a otro
    pub async fn acquire_key(&self, key: &str, holder: &str, ttl_ms: u64) -> RedisResult<bool> {
        let mut conn = self.manager.clone();
        let acquired: i64 = Script::new(ACQUIRE_SCRIPT)
            .key(key)
            .arg(holder)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await?;

        debug!("🔒 ACQUIRE {} holder={} ttl={}ms -> {}", key, holder, ttl_ms, acquired);
        Ok(acquired == 1)
    }

    /// Borrar la clave sólo si pertenece a `holder`
    pub async fn release_key(&self, key: &str, holder: &str) -> RedisResult<bool> {
        let mut conn = self.manager.clone();
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await?;

        debug!("🔓 RELEASE {} holder={} -> {}", key, holder, deleted);
        Ok(deleted == 1)
    }

    pub async fn get_value(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get(key).await
    }

    /// PUBLISH en un canal; devuelve el número de suscriptores que lo recibieron
    pub async fn publish(&self, channel: &str, payload: &str) -> RedisResult<i64> {
        let mut conn = self.manager.clone();
        conn.publish(channel, payload).await
    }

    /// Verificar si Redis está conectado
    pub async fn is_connected(&self) -> bool {
        let mut conn = self.manager.clone();
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(response) => response == "PONG",
            Err(_) => false,
        }
    }
}

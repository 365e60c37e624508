//! Command handler for the stash shell

use std::sync::Arc;

use serde_json::json;
use stashcache::StashCache;

use crate::reply::Reply;

pub struct CommandHandler {
    cache: Arc<StashCache>,
}

impl CommandHandler {
    pub fn new(cache: Arc<StashCache>) -> Self {
        Self { cache }
    }

    /// Handle one input line. Blank lines and `#` comments yield `None`.
    pub fn handle(&self, line: &str) -> Option<Reply> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut parts = line.split_whitespace();
        let command = parts.next()?.to_uppercase();
        let args: Vec<&str> = parts.collect();

        let reply = match command.as_str() {
            "PING" => Reply::Status("PONG".to_string()),
            "GET" => self.handle_get(&args),
            "SET" => self.handle_set(&args),
            "EVICT" => self.handle_evict(&args),
            "PREFETCH" => self.handle_prefetch(&args),
            "CAPACITY" => Reply::Integer(self.cache.remaining_capacity() as i64),
            "LEN" => Reply::Integer(self.cache.len() as i64),
            "STATS" => self.handle_stats(),
            "FLUSH" => self.handle_flush(),
            "QUIT" | "EXIT" => Reply::Quit,
            _ => Reply::Error(format!("ERR unknown command '{}'", command)),
        };
        Some(reply)
    }

    fn handle_get(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return wrong_arity("get");
        };

        match self.cache.get(key.as_bytes()) {
            Ok(Some(value)) => Reply::Value(value),
            Ok(None) => Reply::Nil,
            Err(e) => Reply::Error(format!("ERR {}", e)),
        }
    }

    fn handle_set(&self, args: &[&str]) -> Reply {
        let (key, value, add_to_cache) = match args {
            [key, value] => (key, value, true),
            [key, value, flag] if flag.eq_ignore_ascii_case("nocache") => (key, value, false),
            [_, _, flag] => return Reply::Error(format!("ERR unknown SET option '{}'", flag)),
            _ => return wrong_arity("set"),
        };

        match self.cache.set(key.as_bytes(), value.as_bytes(), add_to_cache) {
            Ok(true) => Reply::Status("CACHED".to_string()),
            Ok(false) => Reply::Status("STORED".to_string()),
            Err(e) => Reply::Error(format!("ERR {}", e)),
        }
    }

    fn handle_evict(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return wrong_arity("evict");
        };

        match self.cache.evict(key.as_bytes()) {
            Ok(evicted) => Reply::Integer(evicted as i64),
            Err(e) => Reply::Error(format!("ERR write-back failed, value lost: {}", e)),
        }
    }

    fn handle_prefetch(&self, args: &[&str]) -> Reply {
        if args.is_empty() {
            return wrong_arity("prefetch");
        }

        match self.cache.prefetch(args.iter().map(|key| key.as_bytes())) {
            Ok(count) => Reply::Integer(count as i64),
            Err(e) => Reply::Error(format!("ERR {}", e)),
        }
    }

    fn handle_stats(&self) -> Reply {
        let stats = self.cache.stats();
        let body = json!({
            "resident": self.cache.len(),
            "capacity": self.cache.capacity(),
            "hit_ratio": stats.hit_ratio(),
            "counters": stats.snapshot(),
        });

        match serde_json::to_string_pretty(&body) {
            Ok(text) => Reply::Text(text),
            Err(e) => Reply::Error(format!("ERR {}", e)),
        }
    }

    fn handle_flush(&self) -> Reply {
        match self.cache.flush() {
            Ok(flushed) => Reply::Integer(flushed as i64),
            Err(e) => Reply::Error(format!("ERR {}", e)),
        }
    }
}

fn wrong_arity(command: &str) -> Reply {
    Reply::Error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn handler(dir: &TempDir, capacity: usize) -> CommandHandler {
        let cache = Arc::new(StashCache::open(dir.path(), capacity).unwrap());
        CommandHandler::new(cache)
    }

    fn run(handler: &CommandHandler, line: &str) -> Reply {
        handler.handle(line).unwrap()
    }

    #[test]
    fn test_ping() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, 10);

        assert_eq!(run(&handler, "ping"), Reply::Status("PONG".to_string()));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, 10);

        assert_eq!(handler.handle("   "), None);
        assert_eq!(handler.handle("# warm up"), None);
    }

    #[test]
    fn test_set_and_get() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, 1);

        assert_eq!(run(&handler, "SET a 1"), Reply::Status("CACHED".to_string()));
        assert_eq!(run(&handler, "SET b 2"), Reply::Status("STORED".to_string()));
        assert_eq!(run(&handler, "SET c 3 nocache"), Reply::Status("STORED".to_string()));

        assert_eq!(run(&handler, "GET a"), Reply::Value(b"1".to_vec()));
        assert_eq!(run(&handler, "GET b"), Reply::Value(b"2".to_vec()));
        assert_eq!(run(&handler, "GET missing"), Reply::Nil);
        assert_eq!(run(&handler, "CAPACITY"), Reply::Integer(0));
    }

    #[test]
    fn test_evict_and_prefetch() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, 4);

        run(&handler, "SET k v");
        assert_eq!(run(&handler, "EVICT k"), Reply::Integer(1));
        assert_eq!(run(&handler, "EVICT k"), Reply::Integer(0));
        assert_eq!(run(&handler, "LEN"), Reply::Integer(0));

        assert_eq!(run(&handler, "PREFETCH k k nope"), Reply::Integer(1));
        assert_eq!(run(&handler, "LEN"), Reply::Integer(1));
        assert_eq!(run(&handler, "FLUSH"), Reply::Integer(1));
    }

    #[test]
    fn test_stats_is_json() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, 4);
        run(&handler, "SET k v");
        run(&handler, "GET k");

        let Reply::Text(text) = run(&handler, "STATS") else {
            panic!("expected text reply");
        };
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["resident"], 1);
        assert_eq!(parsed["counters"]["hits"], 1);
        assert_eq!(parsed["counters"]["additions"], 1);
    }

    #[test]
    fn test_errors() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, 4);

        assert!(matches!(run(&handler, "GET"), Reply::Error(_)));
        assert!(matches!(run(&handler, "SET k"), Reply::Error(_)));
        assert!(matches!(run(&handler, "SET k v sometimes"), Reply::Error(_)));
        assert!(matches!(run(&handler, "PREFETCH"), Reply::Error(_)));
        assert!(matches!(run(&handler, "FROB"), Reply::Error(_)));
        assert_eq!(run(&handler, "quit"), Reply::Quit);
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;
use venue_api::{Bar, Instrument, OrderType, Side};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::filters::FilterCache;
use crate::interval::interval_millis;

type HmacSha256 = Hmac<Sha256>;

/// Page size of the venue's historical kline endpoint.
const KLINES_PAGE_LIMIT: usize = 500;

/// Raw acknowledgement returned by the venue for a new order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
    pub side: String,
    #[serde(default)]
    pub executed_qty: Option<String>,
    #[serde(default)]
    pub avg_price: Option<String>,
    #[serde(default)]
    pub cum_quote: Option<String>,
    #[serde(default)]
    pub update_time: Option<i64>,
}

impl OrderAck {
    pub fn executed_qty_f64(&self) -> f64 {
        parse_decimal(self.executed_qty.as_deref())
    }

    pub fn avg_price_f64(&self) -> f64 {
        parse_decimal(self.avg_price.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct VenueErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListenKey {
    listen_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceEntry {
    asset: String,
    #[serde(default)]
    available_balance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    #[serde(default)]
    step_size: Option<String>,
    #[serde(default)]
    tick_size: Option<String>,
    #[serde(default)]
    min_qty: Option<String>,
    #[serde(default)]
    notional: Option<String>,
    #[serde(default)]
    min_notional: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: String,
}

enum Auth {
    Public,
    Key,
    Signed,
}

/// Blocking REST facade for the venue.
///
/// Stateless except for the clock offset, the rate-limit gate, and the
/// filter/balance caches. Every call waits out a minimum inter-call gap;
/// only read-only calls are retried on transport errors.
pub struct VenueGateway {
    config: GatewayConfig,
    client: Client,
    clock_offset_ms: AtomicI64,
    last_request: Mutex<Option<Instant>>,
    filters: FilterCache,
    balances: Mutex<HashMap<String, f64>>,
}

impl VenueGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        Ok(Self {
            config,
            client,
            clock_offset_ms: AtomicI64::new(0),
            last_request: Mutex::new(None),
            filters: FilterCache::new(),
            balances: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn filters(&self) -> &FilterCache {
        &self.filters
    }

    // ---- clock -----------------------------------------------------------

    pub fn server_time(&self) -> Result<i64, GatewayError> {
        let body = self.request(Method::GET, "/fapi/v1/time", &[], Auth::Public)?;
        let st: ServerTime = decode(&body)?;
        Ok(st.server_time)
    }

    /// Resynchronizes the local clock offset against the venue's server
    /// time. Returns the new offset in milliseconds.
    pub fn sync_clock(&self) -> Result<i64, GatewayError> {
        let server = self.server_time()?;
        let offset = server - chrono::Utc::now().timestamp_millis();
        self.clock_offset_ms.store(offset, Ordering::Relaxed);
        info!("[VenueGateway] clock resynced, offset {}ms", offset);
        Ok(offset)
    }

    fn timestamp_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() + self.clock_offset_ms.load(Ordering::Relaxed)
    }

    // ---- instruments and balances ---------------------------------------

    /// Instrument filters, fetched at most once per symbol per process.
    pub fn get_filters(&self, symbol: &str) -> Result<Instrument, GatewayError> {
        if let Some(cached) = self.filters.get(symbol) {
            return Ok(cached);
        }
        let instrument = self.fetch_filters(symbol)?;
        self.filters.insert(instrument.clone());
        Ok(instrument)
    }

    /// Forces a refetch of one symbol's filters. Only needed after a
    /// filter-shaped venue rejection; the normal path caches forever.
    pub fn refresh_filters(&self, symbol: &str) -> Result<Instrument, GatewayError> {
        self.filters.evict(symbol);
        self.get_filters(symbol)
    }

    fn fetch_filters(&self, symbol: &str) -> Result<Instrument, GatewayError> {
        let body = self.with_retries("exchangeInfo", || {
            self.request(Method::GET, "/fapi/v1/exchangeInfo", &[], Auth::Public)
        })?;
        let info: ExchangeInfo = decode(&body)?;
        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| GatewayError::InvalidResponse(format!("unknown symbol {symbol}")))?;
        Ok(instrument_from_info(&entry))
    }

    /// Available balance for one asset; 0.0 when the venue does not list it.
    pub fn get_balance(&self, asset: &str) -> Result<f64, GatewayError> {
        let body = self.with_retries("balance", || {
            self.signed_request(Method::GET, "/fapi/v2/balance", &[])
        })?;
        let entries: Vec<BalanceEntry> = decode(&body)?;
        let mut balances = self.balances.lock().expect("balance cache mutex poisoned");
        for entry in &entries {
            balances.insert(
                entry.asset.clone(),
                parse_decimal(entry.available_balance.as_deref()),
            );
        }
        Ok(balances.get(asset).copied().unwrap_or(0.0))
    }

    /// Refreshes and returns the quote-asset balance.
    pub fn refresh_balance(&self) -> Result<f64, GatewayError> {
        let quote = self.config.quote_asset.clone();
        self.get_balance(&quote)
    }

    /// Last fetched balance for an asset, without a network round trip.
    pub fn cached_balance(&self, asset: &str) -> Option<f64> {
        self.balances
            .lock()
            .expect("balance cache mutex poisoned")
            .get(asset)
            .copied()
    }

    // ---- historical bars -------------------------------------------------

    /// Ordered historical bars from `start_ms` to now, paginating until the
    /// venue returns a short page. Safely retryable.
    pub fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
    ) -> Result<Vec<Bar>, GatewayError> {
        let mut bars = Vec::new();
        let mut cursor = start_ms;
        loop {
            let body = self.with_retries("klines", || {
                self.request(
                    Method::GET,
                    "/fapi/v1/klines",
                    &[
                        ("symbol", symbol.to_string()),
                        ("interval", interval.to_string()),
                        ("startTime", cursor.to_string()),
                        ("limit", KLINES_PAGE_LIMIT.to_string()),
                    ],
                    Auth::Public,
                )
            })?;
            let rows: Vec<serde_json::Value> = decode(&body)?;
            let page = rows.len();
            for row in &rows {
                if let Some(bar) = bar_from_kline_row(row) {
                    cursor = bar.open_time + interval_millis(interval);
                    bars.push(bar);
                }
            }
            if page < KLINES_PAGE_LIMIT {
                break;
            }
        }
        debug!(
            "[VenueGateway] fetched {} historical bars for {} {}",
            bars.len(),
            symbol,
            interval
        );
        Ok(bars)
    }

    // ---- orders ----------------------------------------------------------

    /// Places an order. Not retried on transport errors (duplicate-order
    /// risk); a clock-skew rejection triggers one resync and one resend
    /// under the same client order id.
    pub fn create_order(
        &self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        size: f64,
        price: Option<f64>,
    ) -> Result<OrderAck, GatewayError> {
        let instrument = self.get_filters(symbol)?;
        let client_id = format!("vg-{}", Uuid::new_v4());
        let params = order_params(&instrument, side, order_type, size, price, &client_id);
        info!(
            "[VenueGateway] create order {} {} {} size={} price={:?}",
            symbol,
            side.as_str(),
            order_type.as_str(),
            size,
            price
        );

        match self.send_order(&params) {
            Err(err) if err.is_clock_skew() => {
                warn!("[VenueGateway] clock skew rejected order, resyncing: {err}");
                self.sync_clock()?;
                self.send_order(&params)
            }
            other => other,
        }
    }

    fn send_order(&self, params: &[(&'static str, String)]) -> Result<OrderAck, GatewayError> {
        let body = self.signed_request(Method::POST, "/fapi/v1/order", params)?;
        decode(&body)
    }

    /// Cancels one order. The venue reporting the order as already gone
    /// (filled or unknown) is a successful no-op.
    pub fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<(), GatewayError> {
        let result = self.signed_request(
            Method::DELETE,
            "/fapi/v1/order",
            &[
                ("symbol", symbol.to_string()),
                ("orderId", order_id.to_string()),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(err) if err.is_order_gone() => {
                debug!("[VenueGateway] cancel {order_id}: already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Cancels every open order on one symbol, if any exist.
    pub fn cancel_open_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let body = self.signed_request(
            Method::GET,
            "/fapi/v1/openOrders",
            &[("symbol", symbol.to_string())],
        )?;
        let open: Vec<serde_json::Value> = decode(&body)?;
        if open.is_empty() {
            return Ok(());
        }
        info!(
            "[VenueGateway] canceling {} open orders on {}",
            open.len(),
            symbol
        );
        self.signed_request(
            Method::DELETE,
            "/fapi/v1/allOpenOrders",
            &[("symbol", symbol.to_string())],
        )?;
        Ok(())
    }

    /// Market-closes every nonzero position on the account.
    pub fn close_all_positions(&self) -> Result<(), GatewayError> {
        let body = self.signed_request(Method::GET, "/fapi/v2/positionRisk", &[])?;
        let positions: Vec<PositionRisk> = decode(&body)?;
        for position in positions {
            let amount = parse_decimal(Some(position.position_amt.as_str()));
            if amount == 0.0 {
                continue;
            }
            let side = if amount > 0.0 { Side::Sell } else { Side::Buy };
            info!(
                "[VenueGateway] closing position {} {}",
                position.symbol, amount
            );
            self.create_order(&position.symbol, side, OrderType::Market, amount.abs(), None)?;
        }
        Ok(())
    }

    // ---- user stream bootstrap -------------------------------------------

    pub fn listen_key(&self) -> Result<String, GatewayError> {
        let body = self.request(Method::POST, "/fapi/v1/listenKey", &[], Auth::Key)?;
        let key: ListenKey = decode(&body)?;
        Ok(key.listen_key)
    }

    pub fn keepalive_listen_key(&self) -> Result<(), GatewayError> {
        self.request(Method::PUT, "/fapi/v1/listenKey", &[], Auth::Key)?;
        Ok(())
    }

    // ---- plumbing --------------------------------------------------------

    /// Enforces the minimum inter-call gap before every request.
    fn throttle(&self) {
        let gap = Duration::from_millis(self.config.rate_gap_ms);
        let mut last = self.last_request.lock().expect("rate gate mutex poisoned");
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < gap {
                thread::sleep(gap - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    /// Retries transport failures up to the configured attempt count. Venue
    /// rejections pass through untouched on the first occurrence.
    fn with_retries<T>(
        &self,
        label: &str,
        mut op: impl FnMut() -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let attempts = self.config.retries.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transport() && attempt < attempts => {
                    warn!(
                        "[VenueGateway] {label} attempt {attempt}/{attempts} failed: {err}"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn signed_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<String, GatewayError> {
        self.request(method, path, params, Auth::Signed)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        auth: Auth,
    ) -> Result<String, GatewayError> {
        self.throttle();

        let mut query = query_string(params);
        if let Auth::Signed = auth {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(&format!(
                "recvWindow={}&timestamp={}",
                self.config.recv_window,
                self.timestamp_ms()
            ));
            let signature = sign_query(&self.config.api_secret, &query);
            query.push_str(&format!("&signature={signature}"));
        }

        let url = if query.is_empty() {
            format!("{}{}", self.config.rest_url, path)
        } else {
            format!("{}{}?{}", self.config.rest_url, path, query)
        };

        let mut request = self.client.request(method, url);
        if !matches!(auth, Auth::Public) {
            request = request.header("X-MBX-APIKEY", &self.config.api_key);
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;

        if status.is_success() {
            return Ok(body);
        }
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            return Err(GatewayError::Transport(format!("http {status}: {body}")));
        }
        if let Ok(venue) = serde_json::from_str::<VenueErrorBody>(&body) {
            return Err(GatewayError::Venue {
                code: venue.code,
                msg: venue.msg,
            });
        }
        Err(GatewayError::InvalidResponse(format!(
            "http {status}: {body}"
        )))
    }
}

/// Builds the parameter list for a new-order request. Quantity and price
/// are rendered through the instrument filters; limit-style orders carry
/// GTC, stop orders send the trigger as stopPrice.
fn order_params(
    instrument: &Instrument,
    side: Side,
    order_type: OrderType,
    size: f64,
    price: Option<f64>,
    client_id: &str,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", instrument.symbol().to_string()),
        ("side", side.as_str().to_string()),
        ("type", order_type.as_str().to_string()),
        ("quantity", instrument.format_quantity(size)),
        ("newClientOrderId", client_id.to_string()),
    ];
    match order_type {
        OrderType::Limit | OrderType::StopLossLimit => {
            if let Some(px) = price {
                params.push(("price", instrument.format_price(px)));
            }
            params.push(("timeInForce", "GTC".to_string()));
        }
        OrderType::StopLoss => {
            if let Some(px) = price {
                params.push(("stopPrice", instrument.format_price(px)));
            }
        }
        OrderType::Market => {}
    }
    params
}

fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn sign_query(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|err| GatewayError::InvalidResponse(err.to_string()))
}

fn parse_decimal(value: Option<&str>) -> f64 {
    value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)
}

/// One historical kline row is a JSON array:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn bar_from_kline_row(row: &serde_json::Value) -> Option<Bar> {
    let fields = row.as_array()?;
    let open_time = fields.first()?.as_i64()?;
    let number = |index: usize| -> Option<f64> {
        fields.get(index)?.as_str()?.parse::<f64>().ok()
    };
    Some(Bar::new(
        open_time,
        number(1)?,
        number(2)?,
        number(3)?,
        number(4)?,
        number(5)?,
    ))
}

fn instrument_from_info(info: &SymbolInfo) -> Instrument {
    let mut step_size = 1.0;
    let mut tick_size = 1.0;
    let mut min_qty = 0.0;
    let mut min_notional = 0.0;
    for filter in &info.filters {
        match filter.filter_type.as_str() {
            "LOT_SIZE" => {
                step_size = parse_decimal(filter.step_size.as_deref());
                min_qty = parse_decimal(filter.min_qty.as_deref());
            }
            "PRICE_FILTER" => {
                tick_size = parse_decimal(filter.tick_size.as_deref());
            }
            kind if kind.contains("NOTIONAL") => {
                min_notional = parse_decimal(
                    filter.notional.as_deref().or(filter.min_notional.as_deref()),
                );
            }
            _ => {}
        }
    }
    Instrument::new(info.symbol.clone(), step_size, tick_size, min_qty, min_notional)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Signature vector from the venue's API documentation.
    #[test]
    fn test_signature_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign_query(secret, payload),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_kline_row_parsing() {
        let row = serde_json::json!([
            1690000000000i64,
            "29000.1",
            "29100.5",
            "28950.0",
            "29050.2",
            "123.45",
            1690000059999i64,
            "3581432.12",
            100,
            "60.0",
            "1742000.0",
            "0"
        ]);
        let bar = bar_from_kline_row(&row).unwrap();
        assert_eq!(bar.open_time, 1690000000000);
        assert!((bar.open - 29000.1).abs() < 1e-9);
        assert!((bar.close - 29050.2).abs() < 1e-9);
        assert!((bar.volume - 123.45).abs() < 1e-9);
    }

    #[test]
    fn test_kline_row_rejects_malformed() {
        assert!(bar_from_kline_row(&serde_json::json!({"not": "array"})).is_none());
        assert!(bar_from_kline_row(&serde_json::json!([1690000000000i64, "x"])).is_none());
    }

    #[test]
    fn test_order_ack_decoding() {
        let body = r#"{
            "orderId": 283194212,
            "symbol": "BTCUSDT",
            "status": "FILLED",
            "clientOrderId": "vg-testid",
            "price": "0",
            "avgPrice": "27050.10",
            "origQty": "0.010",
            "executedQty": "0.010",
            "cumQuote": "270.501",
            "side": "BUY",
            "type": "MARKET",
            "updateTime": 1690000000123
        }"#;
        let ack: OrderAck = decode(body).unwrap();
        assert_eq!(ack.order_id, 283194212);
        assert_eq!(ack.status, "FILLED");
        assert!((ack.executed_qty_f64() - 0.01).abs() < 1e-9);
        assert!((ack.avg_price_f64() - 27050.10).abs() < 1e-9);
        assert_eq!(ack.update_time, Some(1690000000123));
    }

    #[test]
    fn test_instrument_from_exchange_info() {
        let body = r#"{
            "symbols": [{
                "symbol": "BTCUSDT",
                "filters": [
                    {"filterType": "PRICE_FILTER", "tickSize": "0.10", "minPrice": "556.80"},
                    {"filterType": "LOT_SIZE", "stepSize": "0.001", "minQty": "0.001"},
                    {"filterType": "MIN_NOTIONAL", "notional": "100"}
                ]
            }]
        }"#;
        let info: ExchangeInfo = decode(body).unwrap();
        let instrument = instrument_from_info(&info.symbols[0]);
        assert_eq!(instrument.symbol(), "BTCUSDT");
        assert!((instrument.step_size() - 0.001).abs() < 1e-12);
        assert!((instrument.tick_size() - 0.1).abs() < 1e-12);
        assert!((instrument.min_notional() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_order_params_market() {
        let instrument = Instrument::new("BTCUSDT", 0.001, 0.1, 0.001, 100.0);
        let params = order_params(&instrument, Side::Buy, OrderType::Market, 0.0123, None, "vg-1");
        let query = query_string(&params);
        assert_eq!(
            query,
            "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=0.012&newClientOrderId=vg-1"
        );
    }

    #[test]
    fn test_order_params_limit_carries_gtc() {
        let instrument = Instrument::new("BTCUSDT", 0.001, 0.1, 0.001, 100.0);
        let params = order_params(
            &instrument,
            Side::Sell,
            OrderType::Limit,
            0.5,
            Some(27123.456),
            "vg-2",
        );
        let query = query_string(&params);
        assert!(query.contains("type=LIMIT"));
        assert!(query.contains("price=27123.4"));
        assert!(query.ends_with("timeInForce=GTC"));
    }

    #[test]
    fn test_order_params_stop_sends_trigger() {
        let instrument = Instrument::new("BTCUSDT", 0.001, 0.1, 0.001, 100.0);
        let params = order_params(
            &instrument,
            Side::Sell,
            OrderType::StopLoss,
            0.5,
            Some(26000.0),
            "vg-3",
        );
        let query = query_string(&params);
        assert!(query.contains("stopPrice=26000.0"));
        assert!(!query.contains("timeInForce"));
    }
}
